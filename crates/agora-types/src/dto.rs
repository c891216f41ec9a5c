use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-facing shapes. Every DTO enumerates exactly the fields that are
/// safe to expose; password hashes and verification tokens never appear
/// here, so anything serialized from these types is safe to ship.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Compact author reference embedded in posts, comments and chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDto {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: AuthorRef,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessageDto {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDto {
    pub id: Uuid,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<AuthorRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessageDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Assistant conversations are single-owner; the owner id is deliberately
/// not exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantChatDto {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessageDto {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDto {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}
