use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::{
    AssistantChatDto, AssistantMessageDto, AuthorRef, ChatDto, ChatMessageDto, CommentDto, PostDto,
    UserDto,
};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserDto,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub message: String,
}

// -- Posts / comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostDto>,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: PostDto,
    pub comments: Vec<CommentDto>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub post_id: Uuid,
    pub content: String,
}

// -- Peer chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    pub name: Option<String>,
    pub participant_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatDetailResponse {
    pub chat: ChatDto,
    pub messages: Vec<ChatMessageDto>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
    pub total_pages: u64,
}

/// Directory shown to ordinary users when picking chat participants.
/// Deliberately the compact author shape: no email, bio or role.
#[derive(Debug, Serialize)]
pub struct UserDirectoryResponse {
    pub users: Vec<AuthorRef>,
    pub total_pages: u64,
}

// -- Assistant chat --

/// One turn of an assistant conversation, in the completion API's wire
/// shape so client history can be forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantRequest {
    pub messages: Vec<ChatTurn>,
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AssistantResponse {
    pub response: ChatTurn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
    pub chat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AssistantChatDetailResponse {
    pub chat: AssistantChatDto,
    pub messages: Vec<AssistantMessageDto>,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
pub struct TableRowsResponse {
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

// -- Errors --

/// Body of every error response. `field_errors` is present only for
/// validation failures, keyed by the offending field.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}
