use axum::Json;
use axum::extract::{Path, State};
use tracing::warn;
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::{
    AssistantChatDetailResponse, AssistantRequest, AssistantResponse, ChatTurn,
};
use agora_types::dto::AssistantChatDto;

use crate::blocking;
use crate::dto::{parse_id, to_assistant_chat_dto, to_assistant_chat_dtos, to_assistant_message_dtos};
use crate::error::ApiError;
use crate::session::AuthSession;
use crate::state::AppState;
use crate::validate::sanitize_input;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const TITLE_MAX_CHARS: usize = 20;

/// Derive a chat title from the opening message.
fn title_from(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

/// The latest turn must be a non-empty user message; everything before it
/// is forwarded history.
fn latest_user_content(messages: &[ChatTurn]) -> Result<String, ApiError> {
    let last = messages
        .last()
        .ok_or_else(|| ApiError::BadRequest("messages must not be empty".into()))?;

    if last.role != "user" {
        return Err(ApiError::BadRequest(
            "the last message must come from the user".into(),
        ));
    }

    let content = sanitize_input(&last.content);
    if content.is_empty() {
        return Err(ApiError::BadRequest("message content is required".into()));
    }
    Ok(content)
}

fn resolve_chat(
    db: &Database,
    user_id: &str,
    requested: Option<Uuid>,
    first_user_content: &str,
) -> Result<String, ApiError> {
    match requested {
        Some(id) => {
            let id = id.to_string();
            // A chat owned by someone else is indistinguishable from a
            // missing one.
            db.get_assistant_chat_for_owner(&id, user_id)
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::NotFound("chat not found".into()))?;
            Ok(id)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            db.insert_assistant_chat(&id, user_id, &title_from(first_user_content))
                .map_err(ApiError::from)?;
            Ok(id)
        }
    }
}

/// POST /assistant/chat — forward the conversation to the configured
/// completion provider and record the exchange under the caller's chat.
pub async fn assistant_chat(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<AssistantRequest>,
) -> Result<Json<AssistantResponse>, ApiError> {
    let Some(completion) = state.completion.as_ref() else {
        return Err(ApiError::Unavailable(
            "the assistant is not configured".into(),
        ));
    };

    let user_content = latest_user_content(&req.messages)?;
    let user_id = session.user_id().to_string();

    let db_state = state.clone();
    let requested = req.chat_id;
    let opening = user_content.clone();
    let chat_id = blocking(move || {
        resolve_chat(&db_state.db, &user_id, requested, &opening)
    })
    .await?;

    // Prepend the system prompt unless the client already supplied one.
    let mut turns = Vec::with_capacity(req.messages.len() + 1);
    if req.messages.first().is_none_or(|m| m.role != "system") {
        turns.push(ChatTurn {
            role: "system".into(),
            content: SYSTEM_PROMPT.into(),
        });
    }
    turns.extend(req.messages.iter().cloned());

    let (reply, usage) = completion.chat(&turns).await.map_err(|e| {
        warn!("completion provider call failed: {:#}", e);
        ApiError::Unavailable("the assistant is currently unavailable".into())
    })?;

    let db_state = state.clone();
    let persisted_chat_id = chat_id.clone();
    let reply_content = reply.content.clone();
    blocking(move || {
        db_state
            .db
            .insert_assistant_exchange(
                &persisted_chat_id,
                &Uuid::new_v4().to_string(),
                &user_content,
                &Uuid::new_v4().to_string(),
                &reply_content,
            )
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(AssistantResponse {
        response: reply,
        usage,
        chat_id: parse_id(&chat_id),
    }))
}

/// GET /assistant/chats — the caller's chats, most recently active first.
pub async fn list_assistant_chats(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<AssistantChatDto>>, ApiError> {
    let user_id = session.user_id().to_string();
    let chats = blocking(move || {
        state
            .db
            .list_assistant_chats(&user_id)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(to_assistant_chat_dtos(chats)))
}

/// GET /assistant/chats/{id} — a chat with its full transcript, owner only.
pub async fn get_assistant_chat(
    State(state): State<AppState>,
    session: AuthSession,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<AssistantChatDetailResponse>, ApiError> {
    let user_id = session.user_id().to_string();
    let chat_id = chat_id.to_string();

    let (chat, messages) = blocking(move || {
        let chat = state
            .db
            .get_assistant_chat_for_owner(&chat_id, &user_id)
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFound("chat not found".into()))?;
        let messages = state
            .db
            .list_assistant_messages(&chat_id)
            .map_err(ApiError::from)?;
        Ok((chat, messages))
    })
    .await?;

    Ok(Json(AssistantChatDetailResponse {
        chat: to_assistant_chat_dto(chat),
        messages: to_assistant_message_dtos(messages),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_db::Database;

    #[test]
    fn title_truncates_long_openings() {
        assert_eq!(title_from("  short question  "), "short question");

        let long = "x".repeat(200);
        let title = title_from(&long);
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn latest_turn_must_be_a_user_message() {
        let err = latest_user_content(&[]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = latest_user_content(&[ChatTurn {
            role: "assistant".into(),
            content: "hello".into(),
        }])
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let content = latest_user_content(&[ChatTurn {
            role: "user".into(),
            content: "  hello  ".into(),
        }])
        .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn foreign_chat_id_behaves_like_missing() {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(&alice.to_string(), "Alice", "a@example.com", None, "user")
            .unwrap();
        db.create_user(&bob.to_string(), "Bob", "b@example.com", None, "user")
            .unwrap();

        let chat_id = resolve_chat(&db, &alice.to_string(), None, "opening line").unwrap();

        // The owner can address the chat again.
        let resolved = resolve_chat(
            &db,
            &alice.to_string(),
            Some(chat_id.parse().unwrap()),
            "next",
        )
        .unwrap();
        assert_eq!(resolved, chat_id);

        // Another user cannot, and learns nothing beyond "not found".
        let err = resolve_chat(
            &db,
            &bob.to_string(),
            Some(chat_id.parse().unwrap()),
            "next",
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn new_chat_takes_its_title_from_the_opening() {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        db.create_user(&alice.to_string(), "Alice", "a@example.com", None, "user")
            .unwrap();

        let chat_id = resolve_chat(&db, &alice.to_string(), None, "What is borrowing?").unwrap();
        let chat = db
            .get_assistant_chat_for_owner(&chat_id, &alice.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(chat.title, "What is borrowing?");
    }
}
