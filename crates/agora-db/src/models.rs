/// Database row types — these map directly to SQLite rows.
/// Distinct from the agora-types DTOs so the DB layer stays independent;
/// ids and timestamps stay TEXT here and are parsed at the API boundary.

pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub email_verified: Option<String>,
    pub created_at: String,
}

/// Outcome of redeeming an email verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailVerification {
    Verified { email: String },
    /// Unknown, expired or already-used token.
    InvalidToken,
    /// Valid token whose address matches no account; left unconsumed.
    UnknownUser,
}

/// Post joined with its author and comment count.
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub comment_count: u64,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
}

pub struct ChatRow {
    pub id: String,
    pub name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ChatParticipantRow {
    pub user_id: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

pub struct ChatMessageRow {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}

pub struct AssistantChatRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct AssistantMessageRow {
    pub id: String,
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

pub struct FileRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
}
