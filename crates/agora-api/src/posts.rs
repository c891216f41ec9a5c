use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::{CommentRequest, PostDetailResponse, PostListResponse, PostRequest};

use crate::blocking;
use crate::dto::{to_comment_dtos, to_post_dto, to_post_dtos};
use crate::error::ApiError;
use crate::permissions::{ResourceKind, check_permission, denial_error};
use crate::session::{AuthSession, Session};
use crate::state::AppState;
use crate::validate::{sanitize_input, validate_comment, validate_post};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

impl PageQuery {
    /// Clamped paging window as (limit, offset, page). Saturating so an
    /// absurd client-supplied page number cannot overflow the offset.
    pub fn window(&self) -> (u64, u64, u64) {
        let page = self.page.max(1);
        let per_page = self.per_page.clamp(1, 50);
        (per_page, page.saturating_sub(1).saturating_mul(per_page), page)
    }
}

pub(crate) fn total_pages(count: u64, per_page: u64) -> u64 {
    count.div_ceil(per_page)
}

// -- Sync cores (exercised directly by tests) --

fn load_posts_page(db: &Database, limit: u64, offset: u64) -> Result<PostListResponse, ApiError> {
    let posts = db.list_published_posts(limit, offset).map_err(ApiError::from)?;
    let count = db.count_published_posts().map_err(ApiError::from)?;

    Ok(PostListResponse {
        posts: to_post_dtos(posts),
        total_pages: total_pages(count, limit),
    })
}

fn load_my_posts(
    db: &Database,
    user_id: &str,
    limit: u64,
    offset: u64,
) -> Result<PostListResponse, ApiError> {
    let posts = db
        .list_posts_by_user(user_id, limit, offset)
        .map_err(ApiError::from)?;
    let count = db.count_posts_by_user(user_id).map_err(ApiError::from)?;

    Ok(PostListResponse {
        posts: to_post_dtos(posts),
        total_pages: total_pages(count, limit),
    })
}

fn load_post_detail(
    db: &Database,
    session: &Session,
    post_id: &str,
) -> Result<PostDetailResponse, ApiError> {
    let post = db
        .get_post(post_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    // Drafts are readable only by their author.
    if !post.published {
        let viewer = session.user_id().map(|id| id.to_string());
        if viewer.as_deref() != Some(post.user_id.as_str()) && !session.is_admin() {
            return Err(ApiError::Forbidden(
                "you do not have permission to view this post".into(),
            ));
        }
    }

    let comments = db.list_comments_for_post(post_id).map_err(ApiError::from)?;

    Ok(PostDetailResponse {
        post: to_post_dto(post),
        comments: to_comment_dtos(comments),
    })
}

fn update_post_checked(
    db: &Database,
    session: &Session,
    post_id: &str,
    title: &str,
    content: &str,
    published: bool,
) -> Result<(), ApiError> {
    let permission = check_permission(db, session, ResourceKind::Post, post_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    db.update_post(post_id, title, content, published)
        .map_err(ApiError::from)
}

fn delete_post_checked(db: &Database, session: &Session, post_id: &str) -> Result<(), ApiError> {
    let permission = check_permission(db, session, ResourceKind::Post, post_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    db.delete_post(post_id).map_err(ApiError::from)
}

fn create_comment_checked(
    db: &Database,
    user_id: &str,
    post_id: &str,
    content: &str,
) -> Result<String, ApiError> {
    let (_, published) = db
        .get_post_meta(post_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    if !published {
        return Err(ApiError::Forbidden(
            "comments are not allowed on unpublished posts".into(),
        ));
    }

    let comment_id = Uuid::new_v4().to_string();
    db.insert_comment(&comment_id, post_id, user_id, content)
        .map_err(ApiError::from)?;
    Ok(comment_id)
}

fn delete_comment_checked(
    db: &Database,
    session: &Session,
    comment_id: &str,
) -> Result<String, ApiError> {
    let permission = check_permission(db, session, ResourceKind::Comment, comment_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    let post_id = db
        .get_comment_post_id(comment_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound("comment not found".into()))?;

    db.delete_comment(comment_id).map_err(ApiError::from)?;
    Ok(post_id)
}

// -- Handlers --

/// GET /posts — published posts, newest first, paginated. Served from the
/// view cache when a fresh page exists.
pub async fn list_posts(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let (limit, offset, page) = query.window();
    let path = format!("/posts?page={}&per_page={}", page, limit);

    if let Some(cached) = state.views.get(&path) {
        return Ok(Json(cached));
    }

    let db_state = state.clone();
    let response =
        blocking(move || load_posts_page(&db_state.db, limit, offset)).await?;

    let value = serde_json::to_value(&response).map_err(|e| {
        tracing::error!("response serialization failed: {}", e);
        ApiError::Internal
    })?;
    state.views.put(&path, value.clone());

    Ok(Json(value))
}

/// GET /posts/mine — the caller's posts, drafts included.
pub async fn list_my_posts(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let (limit, offset, _) = query.window();
    let user_id = session.user_id().to_string();

    let response =
        blocking(move || load_my_posts(&state.db, &user_id, limit, offset)).await?;
    Ok(Json(response))
}

pub async fn get_post(
    State(state): State<AppState>,
    session: AuthSession,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let session = session.session();
    let response =
        blocking(move || load_post_detail(&state.db, &session, &post_id.to_string())).await?;
    Ok(Json(response))
}

pub async fn create_post(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<PostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = sanitize_input(&req.title);
    let content = sanitize_input(&req.content);
    let input = validate_post(&title, &content, req.published).map_err(ApiError::validation)?;

    let user_id = session.user_id().to_string();
    let db_state = state.clone();
    let post_id = blocking(move || {
        let post_id = Uuid::new_v4().to_string();
        db_state
            .db
            .insert_post(&post_id, &user_id, &input.title, &input.content, input.published)
            .map_err(ApiError::from)?;
        Ok(post_id)
    })
    .await?;

    state.views.invalidate_prefix("/posts");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "post_id": post_id })),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    session: AuthSession,
    Path(post_id): Path<Uuid>,
    Json(req): Json<PostRequest>,
) -> Result<Json<Value>, ApiError> {
    let title = sanitize_input(&req.title);
    let content = sanitize_input(&req.content);
    let input = validate_post(&title, &content, req.published).map_err(ApiError::validation)?;

    let session = session.session();
    let db_state = state.clone();
    blocking(move || {
        update_post_checked(
            &db_state.db,
            &session,
            &post_id.to_string(),
            &input.title,
            &input.content,
            input.published,
        )
    })
    .await?;

    state.views.invalidate_prefix("/posts");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    session: AuthSession,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    blocking(move || delete_post_checked(&db_state.db, &session, &post_id.to_string())).await?;

    state.views.invalidate_prefix("/posts");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn create_comment(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = sanitize_input(&req.content);
    let content = validate_comment(&content).map_err(ApiError::validation)?;

    let user_id = session.user_id().to_string();
    let post_id = req.post_id.to_string();
    let db_state = state.clone();
    let comment_id = blocking(move || {
        create_comment_checked(&db_state.db, &user_id, &post_id, &content)
    })
    .await?;

    state.views.invalidate_prefix("/posts");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "comment_id": comment_id })),
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    session: AuthSession,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    let post_id = blocking(move || {
        delete_comment_checked(&db_state.db, &session, &comment_id.to_string())
    })
    .await?;

    state.views.invalidate(&format!("/posts/{post_id}"));
    state.views.invalidate_prefix("/posts");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Claims, Session};
    use agora_db::Database;

    fn session_for(id: Uuid, role: &str) -> Session {
        Session::authenticated(Claims {
            sub: id,
            name: None,
            role: role.into(),
            exp: 0,
        })
    }

    fn fixture() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(&alice.to_string(), "Alice", "a@example.com", None, "user")
            .unwrap();
        db.create_user(&bob.to_string(), "Bob", "b@example.com", None, "user")
            .unwrap();
        (db, alice, bob)
    }

    #[test]
    fn draft_post_is_owner_only() {
        let (db, alice, bob) = fixture();
        db.insert_post("p1", &alice.to_string(), "Draft", "Body", false)
            .unwrap();

        // The author reads the full content.
        let detail = load_post_detail(&db, &session_for(alice, "user"), "p1").unwrap();
        assert_eq!(detail.post.content, "Body");

        // Anyone else gets a permission-phrased error.
        let err = load_post_detail(&db, &session_for(bob, "user"), "p1").unwrap_err();
        assert!(err.to_string().contains("permission"));

        // Admins can read drafts.
        assert!(load_post_detail(&db, &session_for(bob, "admin"), "p1").is_ok());
    }

    #[test]
    fn missing_post_is_not_found() {
        let (db, alice, _) = fixture();
        let err = load_post_detail(&db, &session_for(alice, "user"), "missing").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn update_requires_ownership() {
        let (db, alice, bob) = fixture();
        db.insert_post("p1", &alice.to_string(), "Title", "Body", true)
            .unwrap();

        let err = update_post_checked(
            &db,
            &session_for(bob, "user"),
            "p1",
            "Hijacked",
            "Body",
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        update_post_checked(&db, &session_for(alice, "user"), "p1", "Edited", "Body", true)
            .unwrap();
        assert_eq!(db.get_post("p1").unwrap().unwrap().title, "Edited");
    }

    #[test]
    fn comments_forbidden_on_drafts() {
        let (db, alice, bob) = fixture();
        db.insert_post("p1", &alice.to_string(), "Draft", "Body", false)
            .unwrap();

        let err = create_comment_checked(&db, &bob.to_string(), "p1", "hi").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn post_owner_may_moderate_comments() {
        let (db, alice, bob) = fixture();
        db.insert_post("p1", &alice.to_string(), "Title", "Body", true)
            .unwrap();
        let comment_id = create_comment_checked(&db, &bob.to_string(), "p1", "rude").unwrap();

        // Alice owns the post, not the comment, and may still delete it.
        let post_id =
            delete_comment_checked(&db, &session_for(alice, "user"), &comment_id).unwrap();
        assert_eq!(post_id, "p1");
    }

    #[test]
    fn listing_paginates() {
        let (db, alice, _) = fixture();
        for i in 0..15 {
            db.insert_post(&format!("p{i}"), &alice.to_string(), "T", "B", true)
                .unwrap();
        }

        let page = load_posts_page(&db, 10, 0).unwrap();
        assert_eq!(page.posts.len(), 10);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn paging_window_survives_extreme_pages() {
        let query = PageQuery {
            page: u64::MAX,
            per_page: 10,
        };
        let (limit, offset, page) = query.window();
        assert_eq!(limit, 10);
        assert_eq!(offset, u64::MAX);
        assert_eq!(page, u64::MAX);

        let query = PageQuery { page: 0, per_page: 0 };
        let (limit, offset, page) = query.window();
        assert_eq!((limit, offset, page), (1, 0, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
