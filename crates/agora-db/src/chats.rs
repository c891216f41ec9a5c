use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::{ChatMessageRow, ChatParticipantRow, ChatRow};

fn chat_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ChatRow, rusqlite::Error> {
    Ok(ChatRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ChatMessageRow, rusqlite::Error> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    /// Create a chat and its participant rows atomically; a failure on any
    /// participant insert rolls back the chat itself.
    pub fn create_chat_with_participants(
        &self,
        chat_id: &str,
        name: Option<&str>,
        participant_ids: &[String],
    ) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO chats (id, name) VALUES (?1, ?2)",
                rusqlite::params![chat_id, name],
            )?;
            for user_id in participant_ids {
                tx.execute(
                    "INSERT INTO chat_participants (user_id, chat_id) VALUES (?1, ?2)",
                    [user_id.as_str(), chat_id],
                )?;
            }
            Ok(())
        })
    }

    pub fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.created_at, c.updated_at
                 FROM chats c
                 JOIN chat_participants cp ON cp.chat_id = c.id
                 WHERE cp.user_id = ?1
                 ORDER BY c.updated_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, created_at, updated_at FROM chats WHERE id = ?1")?;
            let row = stmt.query_row([id], chat_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_chat_participants(&self, chat_id: &str) -> Result<Vec<ChatParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cp.user_id, u.name, u.image
                 FROM chat_participants cp
                 LEFT JOIN users u ON cp.user_id = u.id
                 WHERE cp.chat_id = ?1
                 ORDER BY cp.joined_at",
            )?;
            let rows = stmt
                .query_map([chat_id], |row| {
                    Ok(ChatParticipantRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        image: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Membership lookup by the composite (user, chat) key — the chat
    /// authorization unit.
    pub fn is_chat_participant(&self, user_id: &str, chat_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM chat_participants WHERE user_id = ?1 AND chat_id = ?2",
                    [user_id, chat_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn add_chat_participant(&self, user_id: &str, chat_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_participants (user_id, chat_id) VALUES (?1, ?2)",
                [user_id, chat_id],
            )?;
            Ok(())
        })
    }

    /// Remove the caller's membership; an emptied chat is deleted in the
    /// same transaction. Returns true when the chat was deleted.
    pub fn leave_chat(&self, user_id: &str, chat_id: &str) -> Result<bool> {
        self.transaction(|tx| {
            tx.execute(
                "DELETE FROM chat_participants WHERE user_id = ?1 AND chat_id = ?2",
                [user_id, chat_id],
            )?;

            let remaining: u64 = tx.query_row(
                "SELECT COUNT(*) FROM chat_participants WHERE chat_id = ?1",
                [chat_id],
                |row| row.get(0),
            )?;

            if remaining == 0 {
                tx.execute("DELETE FROM chats WHERE id = ?1", [chat_id])?;
                return Ok(true);
            }
            Ok(false)
        })
    }

    /// Insert a message and bump the parent chat's `updated_at` so chat
    /// lists sort by recent activity; both writes commit together.
    pub fn insert_chat_message(
        &self,
        id: &str,
        chat_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO chat_messages (id, chat_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                [id, chat_id, user_id, content],
            )?;
            tx.execute(
                "UPDATE chats SET updated_at = datetime('now') WHERE id = ?1",
                [chat_id],
            )?;
            Ok(())
        })
    }

    pub fn list_chat_messages(&self, chat_id: &str) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, user_id, content, created_at
                 FROM chat_messages WHERE chat_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([chat_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn last_chat_message(&self, chat_id: &str) -> Result<Option<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, user_id, content, created_at
                 FROM chat_messages WHERE chat_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
            )?;
            let row = stmt.query_row([chat_id], message_from_row).optional()?;
            Ok(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn fixture() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, name, email) in [
            ("alice", "Alice", "a@example.com"),
            ("bob", "Bob", "b@example.com"),
            ("carol", "Carol", "c@example.com"),
        ] {
            db.create_user(id, name, email, None, "user").unwrap();
        }
        db
    }

    #[test]
    fn participant_insert_failure_rolls_back_chat() {
        let db = fixture();
        // Duplicate participant violates UNIQUE(user_id, chat_id).
        let result = db.create_chat_with_participants(
            "ch1",
            Some("pair"),
            &["alice".into(), "alice".into()],
        );
        assert!(result.is_err());
        assert!(db.get_chat("ch1").unwrap().is_none());
    }

    #[test]
    fn membership_gates_participancy() {
        let db = fixture();
        db.create_chat_with_participants("ch1", None, &["alice".into(), "bob".into()])
            .unwrap();

        assert!(db.is_chat_participant("alice", "ch1").unwrap());
        assert!(db.is_chat_participant("bob", "ch1").unwrap());
        assert!(!db.is_chat_participant("carol", "ch1").unwrap());
    }

    #[test]
    fn message_bumps_chat_activity() {
        let db = fixture();
        db.create_chat_with_participants("ch1", None, &["alice".into()])
            .unwrap();

        // Push updated_at into the past so the bump is observable.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE chats SET updated_at = '2000-01-01 00:00:00' WHERE id = 'ch1'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        db.insert_chat_message("m1", "ch1", "alice", "hello").unwrap();

        let chat = db.get_chat("ch1").unwrap().unwrap();
        assert_ne!(chat.updated_at, "2000-01-01 00:00:00");

        let last = db.last_chat_message("ch1").unwrap().unwrap();
        assert_eq!(last.content, "hello");
    }

    #[test]
    fn last_participant_leaving_deletes_chat() {
        let db = fixture();
        db.create_chat_with_participants("ch1", None, &["alice".into(), "bob".into()])
            .unwrap();

        assert!(!db.leave_chat("alice", "ch1").unwrap());
        assert!(db.get_chat("ch1").unwrap().is_some());

        assert!(db.leave_chat("bob", "ch1").unwrap());
        assert!(db.get_chat("ch1").unwrap().is_none());
    }

    #[test]
    fn chats_sort_by_recent_activity() {
        let db = fixture();
        db.create_chat_with_participants("old", None, &["alice".into()])
            .unwrap();
        db.create_chat_with_participants("busy", None, &["alice".into()])
            .unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE chats SET updated_at = '2000-01-01 00:00:00' WHERE id = 'old'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let chats = db.list_chats_for_user("alice").unwrap();
        assert_eq!(chats[0].id, "busy");
        assert_eq!(chats[1].id, "old");
    }
}
