use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use agora_db::models::{
    AssistantChatRow, AssistantMessageRow, ChatMessageRow, ChatParticipantRow, ChatRow, CommentRow,
    FileRow, PostRow, UserRow,
};
use agora_types::dto::{
    AssistantChatDto, AssistantMessageDto, AuthorRef, ChatDto, ChatMessageDto, CommentDto, FileDto,
    LastMessageDto, PostDto, UserDto,
};

/// Row-to-DTO converters. Pure functions; each enumerates exactly the
/// fields safe to expose, so credential hashes never cross this boundary.
/// Collection variants preserve input order.

pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn to_user_dto(user: UserRow) -> UserDto {
    UserDto {
        id: parse_id(&user.id),
        name: user.name,
        email: user.email,
        image: user.image,
        bio: user.bio,
        role: user.role,
        created_at: parse_timestamp(&user.created_at),
        // password hash and verification state stay server-side
    }
}

pub fn to_post_dto(post: PostRow) -> PostDto {
    PostDto {
        id: parse_id(&post.id),
        title: post.title,
        content: post.content,
        published: post.published,
        created_at: parse_timestamp(&post.created_at),
        updated_at: parse_timestamp(&post.updated_at),
        author: AuthorRef {
            id: parse_id(&post.user_id),
            name: post.author_name,
            image: post.author_image,
        },
        comment_count: post.comment_count,
    }
}

pub fn to_comment_dto(comment: CommentRow) -> CommentDto {
    CommentDto {
        id: parse_id(&comment.id),
        content: comment.content,
        created_at: parse_timestamp(&comment.created_at),
        author: AuthorRef {
            id: parse_id(&comment.user_id),
            name: comment.author_name,
            image: comment.author_image,
        },
    }
}

pub fn to_chat_dto(
    chat: ChatRow,
    participants: Vec<ChatParticipantRow>,
    last_message: Option<ChatMessageRow>,
) -> ChatDto {
    ChatDto {
        id: parse_id(&chat.id),
        name: chat.name,
        created_at: parse_timestamp(&chat.created_at),
        participants: participants
            .into_iter()
            .map(|p| AuthorRef {
                id: parse_id(&p.user_id),
                name: p.name,
                image: p.image,
            })
            .collect(),
        last_message: last_message.map(|m| LastMessageDto {
            content: m.content,
            created_at: parse_timestamp(&m.created_at),
        }),
    }
}

pub fn to_chat_message_dto(message: ChatMessageRow) -> ChatMessageDto {
    ChatMessageDto {
        id: parse_id(&message.id),
        content: message.content,
        user_id: parse_id(&message.user_id),
        created_at: parse_timestamp(&message.created_at),
    }
}

pub fn to_assistant_chat_dto(chat: AssistantChatRow) -> AssistantChatDto {
    AssistantChatDto {
        id: parse_id(&chat.id),
        title: chat.title,
        created_at: parse_timestamp(&chat.created_at),
        updated_at: parse_timestamp(&chat.updated_at),
        // owner id is deliberately omitted
    }
}

pub fn to_assistant_message_dto(message: AssistantMessageRow) -> AssistantMessageDto {
    AssistantMessageDto {
        id: parse_id(&message.id),
        role: message.role,
        content: message.content,
        created_at: parse_timestamp(&message.created_at),
    }
}

pub fn to_file_dto(file: FileRow) -> FileDto {
    FileDto {
        id: parse_id(&file.id),
        name: file.name,
        content_type: file.content_type,
        size: file.size.max(0) as u64,
        created_at: parse_timestamp(&file.created_at),
    }
}

/// Directory entry: only the fields any user may see of another.
pub fn to_author_ref(user: UserRow) -> AuthorRef {
    AuthorRef {
        id: parse_id(&user.id),
        name: user.name,
        image: user.image,
    }
}

pub fn to_user_dtos(users: Vec<UserRow>) -> Vec<UserDto> {
    users.into_iter().map(to_user_dto).collect()
}

pub fn to_author_refs(users: Vec<UserRow>) -> Vec<AuthorRef> {
    users.into_iter().map(to_author_ref).collect()
}

pub fn to_post_dtos(posts: Vec<PostRow>) -> Vec<PostDto> {
    posts.into_iter().map(to_post_dto).collect()
}

pub fn to_comment_dtos(comments: Vec<CommentRow>) -> Vec<CommentDto> {
    comments.into_iter().map(to_comment_dto).collect()
}

pub fn to_chat_message_dtos(messages: Vec<ChatMessageRow>) -> Vec<ChatMessageDto> {
    messages.into_iter().map(to_chat_message_dto).collect()
}

pub fn to_assistant_chat_dtos(chats: Vec<AssistantChatRow>) -> Vec<AssistantChatDto> {
    chats.into_iter().map(to_assistant_chat_dto).collect()
}

pub fn to_assistant_message_dtos(messages: Vec<AssistantMessageRow>) -> Vec<AssistantMessageDto> {
    messages.into_iter().map(to_assistant_message_dto).collect()
}
