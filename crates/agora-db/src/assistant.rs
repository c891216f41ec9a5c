use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::{AssistantChatRow, AssistantMessageRow};

fn chat_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<AssistantChatRow, rusqlite::Error> {
    Ok(AssistantChatRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    pub fn insert_assistant_chat(&self, id: &str, user_id: &str, title: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO assistant_chats (id, user_id, title) VALUES (?1, ?2, ?3)",
                [id, user_id, title],
            )?;
            Ok(())
        })
    }

    pub fn list_assistant_chats(&self, user_id: &str) -> Result<Vec<AssistantChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, created_at, updated_at
                 FROM assistant_chats WHERE user_id = ?1
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Looked up by id AND owner: a foreign chat id behaves exactly like a
    /// missing one.
    pub fn get_assistant_chat_for_owner(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<AssistantChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, created_at, updated_at
                 FROM assistant_chats WHERE id = ?1 AND user_id = ?2",
            )?;
            let row = stmt.query_row([id, user_id], chat_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_assistant_messages(&self, chat_id: &str) -> Result<Vec<AssistantMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, content, created_at
                 FROM assistant_messages WHERE chat_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([chat_id], |row| {
                    Ok(AssistantMessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Persist a user/assistant message pair and bump the chat's
    /// `updated_at`, all-or-nothing.
    pub fn insert_assistant_exchange(
        &self,
        chat_id: &str,
        user_message_id: &str,
        user_content: &str,
        assistant_message_id: &str,
        assistant_content: &str,
    ) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO assistant_messages (id, chat_id, role, content)
                 VALUES (?1, ?2, 'user', ?3)",
                [user_message_id, chat_id, user_content],
            )?;
            tx.execute(
                "INSERT INTO assistant_messages (id, chat_id, role, content)
                 VALUES (?1, ?2, 'assistant', ?3)",
                [assistant_message_id, chat_id, assistant_content],
            )?;
            tx.execute(
                "UPDATE assistant_chats SET updated_at = datetime('now') WHERE id = ?1",
                [chat_id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn fixture() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "Alice", "a@example.com", None, "user")
            .unwrap();
        db.create_user("bob", "Bob", "b@example.com", None, "user")
            .unwrap();
        db
    }

    #[test]
    fn owner_scoped_lookup_hides_foreign_chats() {
        let db = fixture();
        db.insert_assistant_chat("ac1", "alice", "Trip planning").unwrap();

        assert!(db.get_assistant_chat_for_owner("ac1", "alice").unwrap().is_some());
        assert!(db.get_assistant_chat_for_owner("ac1", "bob").unwrap().is_none());
    }

    #[test]
    fn exchange_is_atomic_and_ordered() {
        let db = fixture();
        db.insert_assistant_chat("ac1", "alice", "Hello").unwrap();
        db.insert_assistant_exchange("ac1", "m1", "Hi there", "m2", "Hello! How can I help?")
            .unwrap();

        let messages = db.list_assistant_messages("ac1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");

        // Duplicate message id fails and leaves no half-written exchange.
        let err = db.insert_assistant_exchange("ac1", "m3", "again", "m3", "dup");
        assert!(err.is_err());
        assert_eq!(db.list_assistant_messages("ac1").unwrap().len(), 2);
    }
}
