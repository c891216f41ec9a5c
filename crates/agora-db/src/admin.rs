use anyhow::Result;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

use crate::Database;

impl Database {
    /// User tables from `sqlite_master` with their row counts. Internal
    /// `sqlite_*` tables are excluded.
    pub fn list_tables(&self) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut tables = Vec::with_capacity(names.len());
            for name in names {
                let count: u64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM \"{name}\""), [], |row| {
                        row.get(0)
                    })?;
                tables.push((name, count));
            }
            Ok(tables)
        })
    }

    /// Dump up to `limit` rows of `table` as JSON objects keyed by column
    /// name. The table name is interpolated into SQL: callers must have
    /// already whitelisted it against the identifier regex.
    pub fn dump_table(&self, table: &str, limit: u64) -> Result<Vec<Map<String, Value>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\" LIMIT ?1"))?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

            let rows = stmt
                .query_map([limit], |row| {
                    let mut record = Map::new();
                    for (idx, column) in columns.iter().enumerate() {
                        record.insert(column.clone(), json_value(row.get_ref(idx)?));
                    }
                    Ok(record)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn tables_and_counts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "Alice", "a@example.com", None, "user")
            .unwrap();

        let tables = db.list_tables().unwrap();
        let users = tables.iter().find(|(name, _)| name == "users").unwrap();
        assert_eq!(users.1, 1);
        assert!(tables.iter().any(|(name, _)| name == "posts"));
        assert!(!tables.iter().any(|(name, _)| name.starts_with("sqlite_")));
    }

    #[test]
    fn dump_returns_json_records() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "Alice", "a@example.com", Some("hash"), "admin")
            .unwrap();

        let records = db.dump_table("users", 100).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "u1");
        assert_eq!(records[0]["role"], "admin");
    }
}
