use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::UserRow;

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
        role: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, email, password_hash, role],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// How many of `ids` name an existing user. Used to reject chat
    /// creation with phantom participants.
    pub fn count_existing_users(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT COUNT(*) FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let count: u64 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
            Ok(count)
        })
    }

    pub fn update_profile(&self, id: &str, name: &str, bio: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET name = ?2, bio = ?3 WHERE id = ?1",
                rusqlite::params![id, name, bio],
            )?;
            Ok(())
        })
    }

    pub fn list_users(&self, limit: u64, offset: u64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map([limit, offset], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password, image, bio, role, email_verified, created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image: row.get(4)?,
        bio: row.get(5)?,
        role: row.get(6)?,
        email_verified: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "Alice", "a@example.com", Some("hash"), "user")
            .unwrap();

        let err = db.create_user("u2", "Alias", "a@example.com", None, "user");
        assert!(err.is_err());
    }

    #[test]
    fn lookup_by_email_and_id() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "Alice", "a@example.com", Some("hash"), "admin")
            .unwrap();

        let by_email = db.get_user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert_eq!(by_email.role, "admin");

        let by_id = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(by_id.email.as_deref(), Some("a@example.com"));

        assert!(db.get_user_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn count_existing_users_ignores_phantoms() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "Alice", "a@example.com", None, "user")
            .unwrap();
        db.create_user("u2", "Bob", "b@example.com", None, "user")
            .unwrap();

        let count = db
            .count_existing_users(&["u1".into(), "u2".into(), "ghost".into()])
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.count_existing_users(&[]).unwrap(), 0);
    }
}
