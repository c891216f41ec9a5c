use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::UserDirectoryResponse;
use agora_types::dto::UserDto;

use crate::blocking;
use crate::dto::{to_author_refs, to_user_dto};
use crate::error::ApiError;
use crate::permissions::{ResourceKind, check_permission, denial_error};
use crate::posts::{PageQuery, total_pages};
use crate::session::{AuthSession, Session};
use crate::state::AppState;
use crate::validate::{sanitize_input, validate_profile};

fn load_user(db: &Database, user_id: &str) -> Result<UserDto, ApiError> {
    let user = db
        .get_user_by_id(user_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(to_user_dto(user))
}

fn update_profile_checked(
    db: &Database,
    session: &Session,
    profile_id: &str,
    name: &str,
    bio: Option<&str>,
) -> Result<UserDto, ApiError> {
    let permission = check_permission(db, session, ResourceKind::Profile, profile_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    let input = validate_profile(name, bio).map_err(ApiError::validation)?;
    db.update_profile(profile_id, &input.name, input.bio.as_deref())
        .map_err(ApiError::from)?;

    load_user(db, profile_id)
}

fn load_directory_page(
    db: &Database,
    limit: u64,
    offset: u64,
) -> Result<UserDirectoryResponse, ApiError> {
    let users = db.list_users(limit, offset).map_err(ApiError::from)?;
    let count = db.count_users().map_err(ApiError::from)?;
    Ok(UserDirectoryResponse {
        users: to_author_refs(users),
        total_pages: total_pages(count, limit),
    })
}

/// GET /users — paginated directory, used when picking chat participants.
/// Compact entries only; full user records stay behind the self-only
/// profile check or the admin listing.
pub async fn list_users(
    State(state): State<AppState>,
    _session: AuthSession,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserDirectoryResponse>, ApiError> {
    let (limit, offset, _) = query.window();
    let response = blocking(move || load_directory_page(&state.db, limit, offset)).await?;
    Ok(Json(response))
}

pub async fn get_me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<UserDto>, ApiError> {
    let user_id = session.user_id().to_string();
    let user = blocking(move || load_user(&state.db, &user_id)).await?;
    Ok(Json(user))
}

/// Full profile records are self-only; the paginated directory is what
/// other users see of each other.
pub async fn get_user(
    State(state): State<AppState>,
    session: AuthSession,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    let session = session.session();
    let user = blocking(move || {
        let id = user_id.to_string();
        let permission = check_permission(&state.db, &session, ResourceKind::Profile, &id);
        if !permission.allowed {
            return Err(denial_error(&permission));
        }
        load_user(&state.db, &id)
    })
    .await?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<agora_types::api::UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let profile_id = session.user_id().to_string();
    let session = session.session();
    let name = sanitize_input(&req.name);
    let bio = req.bio.as_deref().map(sanitize_input);

    let user = blocking(move || {
        update_profile_checked(&state.db, &session, &profile_id, &name, bio.as_deref())
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true, "user": user })))
}
