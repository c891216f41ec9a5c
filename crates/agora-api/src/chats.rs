use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::{AddParticipantRequest, ChatDetailResponse, CreateChatRequest, SendMessageRequest};
use agora_types::dto::ChatDto;

use crate::blocking;
use crate::dto::{to_chat_dto, to_chat_message_dtos};
use crate::error::ApiError;
use crate::permissions::{ResourceKind, check_permission, denial_error};
use crate::session::{AuthSession, Session, session_user_id};
use crate::state::AppState;
use crate::validate::{sanitize_input, validate_chat, validate_chat_message};

// -- Sync cores --

fn load_chat_list(db: &Database, user_id: &str) -> Result<Vec<ChatDto>, ApiError> {
    let chats = db.list_chats_for_user(user_id).map_err(ApiError::from)?;

    let mut out = Vec::with_capacity(chats.len());
    for chat in chats {
        let participants = db.get_chat_participants(&chat.id).map_err(ApiError::from)?;
        let last = db.last_chat_message(&chat.id).map_err(ApiError::from)?;
        out.push(to_chat_dto(chat, participants, last));
    }
    Ok(out)
}

fn create_chat_checked(
    db: &Database,
    creator_id: &str,
    name: Option<&str>,
    participant_ids: &[Uuid],
) -> Result<String, ApiError> {
    let input = validate_chat(name, participant_ids.len()).map_err(ApiError::validation)?;

    // The creator always joins; dedupe so a self-mention does not break
    // the UNIQUE(user_id, chat_id) constraint.
    let mut members: Vec<String> = vec![creator_id.to_string()];
    for id in participant_ids {
        let id = id.to_string();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    let existing = db.count_existing_users(&members).map_err(ApiError::from)?;
    if existing != members.len() as u64 {
        return Err(ApiError::BadRequest(
            "one or more participants do not exist".into(),
        ));
    }

    let chat_id = Uuid::new_v4().to_string();
    db.create_chat_with_participants(&chat_id, input.name.as_deref(), &members)
        .map_err(ApiError::from)?;
    Ok(chat_id)
}

fn load_chat_detail(
    db: &Database,
    session: &Session,
    chat_id: &str,
) -> Result<ChatDetailResponse, ApiError> {
    let permission = check_permission(db, session, ResourceKind::Chat, chat_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    let chat = db
        .get_chat(chat_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound("chat not found".into()))?;
    let participants = db.get_chat_participants(chat_id).map_err(ApiError::from)?;
    let messages = db.list_chat_messages(chat_id).map_err(ApiError::from)?;

    Ok(ChatDetailResponse {
        chat: to_chat_dto(chat, participants, None),
        messages: to_chat_message_dtos(messages),
    })
}

fn send_message_checked(
    db: &Database,
    session: &Session,
    chat_id: &str,
    content: &str,
) -> Result<String, ApiError> {
    let permission = check_permission(db, session, ResourceKind::Chat, chat_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    let content = validate_chat_message(content).map_err(ApiError::validation)?;

    let message_id = Uuid::new_v4().to_string();
    let user_id = session_user_id(session).map_err(ApiError::from)?.to_string();
    db.insert_chat_message(&message_id, chat_id, &user_id, &content)
        .map_err(ApiError::from)?;
    Ok(message_id)
}

fn add_participant_checked(
    db: &Database,
    session: &Session,
    chat_id: &str,
    new_user_id: &str,
) -> Result<(), ApiError> {
    let permission = check_permission(db, session, ResourceKind::Chat, chat_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    if !db.user_exists(new_user_id).map_err(ApiError::from)? {
        return Err(ApiError::NotFound("user not found".into()));
    }
    if db
        .is_chat_participant(new_user_id, chat_id)
        .map_err(ApiError::from)?
    {
        return Err(ApiError::Conflict(
            "user is already a participant in this chat".into(),
        ));
    }

    db.add_chat_participant(new_user_id, chat_id)
        .map_err(ApiError::from)
}

fn leave_chat_checked(
    db: &Database,
    session: &Session,
    chat_id: &str,
) -> Result<bool, ApiError> {
    let permission = check_permission(db, session, ResourceKind::Chat, chat_id);
    if !permission.allowed {
        return Err(denial_error(&permission));
    }

    let user_id = session_user_id(session).map_err(ApiError::from)?.to_string();
    db.leave_chat(&user_id, chat_id).map_err(ApiError::from)
}

// -- Handlers --

pub async fn list_chats(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<ChatDto>>, ApiError> {
    let user_id = session.user_id().to_string();
    let chats = blocking(move || load_chat_list(&state.db, &user_id)).await?;
    Ok(Json(chats))
}

pub async fn create_chat(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creator_id = session.user_id().to_string();
    let name = req.name.as_deref().map(sanitize_input);

    let db_state = state.clone();
    let chat_id = blocking(move || {
        create_chat_checked(&db_state.db, &creator_id, name.as_deref(), &req.participant_ids)
    })
    .await?;

    state.views.invalidate_prefix("/chats");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "chat_id": chat_id })),
    ))
}

pub async fn get_chat(
    State(state): State<AppState>,
    session: AuthSession,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatDetailResponse>, ApiError> {
    let session = session.session();
    let detail =
        blocking(move || load_chat_detail(&state.db, &session, &chat_id.to_string())).await?;
    Ok(Json(detail))
}

pub async fn send_message(
    State(state): State<AppState>,
    session: AuthSession,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session.session();
    let content = sanitize_input(&req.content);

    let db_state = state.clone();
    let message_id = blocking(move || {
        send_message_checked(&db_state.db, &session, &chat_id.to_string(), &content)
    })
    .await?;

    state.views.invalidate_prefix("/chats");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "message_id": message_id })),
    ))
}

pub async fn add_participant(
    State(state): State<AppState>,
    session: AuthSession,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<AddParticipantRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    blocking(move || {
        add_participant_checked(
            &db_state.db,
            &session,
            &chat_id.to_string(),
            &req.user_id.to_string(),
        )
    })
    .await?;

    state.views.invalidate_prefix("/chats");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn leave_chat(
    State(state): State<AppState>,
    session: AuthSession,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = session.session();
    let db_state = state.clone();
    let chat_deleted =
        blocking(move || leave_chat_checked(&db_state.db, &session, &chat_id.to_string())).await?;

    state.views.invalidate_prefix("/chats");
    Ok(Json(
        serde_json::json!({ "success": true, "chat_deleted": chat_deleted }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Claims, Session};
    use agora_db::Database;

    fn session_for(id: Uuid) -> Session {
        Session::authenticated(Claims {
            sub: id,
            name: None,
            role: "user".into(),
            exp: 0,
        })
    }

    fn fixture() -> (Database, Uuid, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        for (id, name, email) in [
            (alice, "Alice", "a@example.com"),
            (bob, "Bob", "b@example.com"),
            (carol, "Carol", "c@example.com"),
        ] {
            db.create_user(&id.to_string(), name, email, None, "user")
                .unwrap();
        }
        (db, alice, bob, carol)
    }

    #[test]
    fn creator_is_always_a_participant() {
        let (db, alice, bob, _) = fixture();

        let chat_id = create_chat_checked(&db, &alice.to_string(), None, &[bob, alice]).unwrap();
        let participants = db.get_chat_participants(&chat_id).unwrap();
        assert_eq!(participants.len(), 2);
        assert!(db.is_chat_participant(&alice.to_string(), &chat_id).unwrap());
    }

    #[test]
    fn unknown_participant_rejects_creation() {
        let (db, alice, _, _) = fixture();

        let err =
            create_chat_checked(&db, &alice.to_string(), None, &[Uuid::new_v4()]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn non_participant_cannot_send_messages() {
        let (db, alice, bob, carol) = fixture();
        let chat_id = create_chat_checked(&db, &alice.to_string(), None, &[bob]).unwrap();

        let err =
            send_message_checked(&db, &session_for(carol), &chat_id, "hello").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(err.to_string(), "not a participant in this chat");

        // No message row was written for the denied sender.
        assert!(db.list_chat_messages(&chat_id).unwrap().is_empty());
    }

    #[test]
    fn non_participant_cannot_read_the_chat() {
        let (db, alice, bob, carol) = fixture();
        let chat_id = create_chat_checked(&db, &alice.to_string(), None, &[bob]).unwrap();

        send_message_checked(&db, &session_for(alice), &chat_id, "hi").unwrap();

        let detail = load_chat_detail(&db, &session_for(bob), &chat_id).unwrap();
        assert_eq!(detail.messages.len(), 1);

        let err = load_chat_detail(&db, &session_for(carol), &chat_id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn adding_an_existing_participant_conflicts() {
        let (db, alice, bob, carol) = fixture();
        let chat_id = create_chat_checked(&db, &alice.to_string(), None, &[bob]).unwrap();

        add_participant_checked(&db, &session_for(alice), &chat_id, &carol.to_string()).unwrap();
        let err = add_participant_checked(&db, &session_for(alice), &chat_id, &carol.to_string())
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn last_leaver_deletes_the_chat() {
        let (db, alice, bob, _) = fixture();
        let chat_id = create_chat_checked(&db, &alice.to_string(), None, &[bob]).unwrap();

        assert!(!leave_chat_checked(&db, &session_for(alice), &chat_id).unwrap());
        assert!(leave_chat_checked(&db, &session_for(bob), &chat_id).unwrap());
        assert!(db.get_chat(&chat_id).unwrap().is_none());
    }

    #[test]
    fn chat_list_orders_by_recent_activity() {
        let (db, alice, bob, _) = fixture();
        let first = create_chat_checked(&db, &alice.to_string(), Some("first"), &[bob]).unwrap();
        let second = create_chat_checked(&db, &alice.to_string(), Some("second"), &[bob]).unwrap();

        // Touch the older chat; it should surface on top.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE chats SET updated_at = datetime('now', '+1 hour') WHERE id = ?1",
                [first.as_str()],
            )?;
            Ok(())
        })
        .unwrap();

        let chats = load_chat_list(&db, &alice.to_string()).unwrap();
        assert_eq!(chats[0].id.to_string(), first);
        assert_eq!(chats[1].id.to_string(), second);
    }
}
