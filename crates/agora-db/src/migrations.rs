use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT,
            email           TEXT UNIQUE,
            password        TEXT,
            image           TEXT,
            bio             TEXT,
            role            TEXT NOT NULL DEFAULT 'user',
            email_verified  TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS verification_tokens (
            identifier  TEXT NOT NULL,
            token       TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'verification',
            expires     TEXT NOT NULL,
            PRIMARY KEY (identifier, token)
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            published   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_published
            ON posts(published, created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            name        TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chat_participants (
            user_id     TEXT NOT NULL REFERENCES users(id),
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, chat_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_chat
            ON chat_participants(chat_id);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
            ON chat_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS assistant_chats (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_assistant_chats_user
            ON assistant_chats(user_id, updated_at);

        CREATE TABLE IF NOT EXISTS assistant_messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES assistant_chats(id) ON DELETE CASCADE,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_assistant_messages_chat
            ON assistant_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS files (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users(id),
            name          TEXT NOT NULL,
            content_type  TEXT NOT NULL,
            size          INTEGER NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database schema ready");
    Ok(())
}
