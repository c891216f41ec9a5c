use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::FileRow;

impl Database {
    pub fn insert_file(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        content_type: &str,
        size: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (id, user_id, name, content_type, size)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, name, content_type, size],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, content_type, size, created_at
                 FROM files WHERE id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(FileRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        content_type: row.get(3)?,
                        size: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_file_owner(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let owner = conn
                .query_row("SELECT user_id FROM files WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(owner)
        })
    }

    pub fn delete_file(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}
