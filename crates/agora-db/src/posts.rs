use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::{CommentRow, PostRow};

/// Posts are fetched JOINed with their author and comment count in a
/// single query (eliminates N+1 on list pages).
const POST_SELECT: &str = "
    SELECT p.id, p.user_id, p.title, p.content, p.published,
           p.created_at, p.updated_at, u.name, u.image,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)
    FROM posts p
    LEFT JOIN users u ON p.user_id = u.id";

fn post_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<PostRow, rusqlite::Error> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        published: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        author_name: row.get(7)?,
        author_image: row.get(8)?,
        comment_count: row.get(9)?,
    })
}

impl Database {
    pub fn insert_post(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        content: &str,
        published: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, title, content, published)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, title, content, published],
            )?;
            Ok(())
        })
    }

    pub fn update_post(&self, id: &str, title: &str, content: &str, published: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts
                 SET title = ?2, content = ?3, published = ?4, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, title, content, published],
            )?;
            Ok(())
        })
    }

    pub fn delete_post(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], post_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_post_owner(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let owner = conn
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(owner)
        })
    }

    /// Owner id and published flag, for the comment-creation checks.
    pub fn get_post_meta(&self, id: &str) -> Result<Option<(String, bool)>> {
        self.with_conn(|conn| {
            let meta = conn
                .query_row(
                    "SELECT user_id, published FROM posts WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(meta)
        })
    }

    pub fn list_published_posts(&self, limit: u64, offset: u64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT} WHERE p.published = 1
                 ORDER BY p.created_at DESC LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit, offset], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_published_posts(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE published = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn list_posts_by_user(&self, user_id: &str, limit: u64, offset: u64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT} WHERE p.user_id = ?1
                 ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_posts_by_user(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, id: &str, post_id: &str, user_id: &str, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, post_id, user_id, content],
            )?;
            Ok(())
        })
    }

    pub fn delete_comment(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn get_comment_post_id(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let post_id = conn
                .query_row("SELECT post_id FROM comments WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(post_id)
        })
    }

    /// The comment's owner and the parent post's owner, in one JOIN.
    /// Moderation allows either to act on the comment.
    pub fn get_comment_owners(&self, id: &str) -> Result<Option<(String, String)>> {
        self.with_conn(|conn| {
            let owners = conn
                .query_row(
                    "SELECT c.user_id, p.user_id
                     FROM comments c
                     JOIN posts p ON c.post_id = p.id
                     WHERE c.id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(owners)
        })
    }

    pub fn list_comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.name, u.image
                 FROM comments c
                 LEFT JOIN users u ON c.user_id = u.id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                        author_name: row.get(5)?,
                        author_image: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
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
    fn post_owner_lookup() {
        let db = fixture();
        db.insert_post("p1", "alice", "Title", "Body", true).unwrap();

        assert_eq!(db.get_post_owner("p1").unwrap().as_deref(), Some("alice"));
        assert!(db.get_post_owner("missing").unwrap().is_none());
    }

    #[test]
    fn comment_owners_join_both_sides() {
        let db = fixture();
        db.insert_post("p1", "alice", "Title", "Body", true).unwrap();
        db.insert_comment("c1", "p1", "bob", "Nice post").unwrap();

        let (comment_owner, post_owner) = db.get_comment_owners("c1").unwrap().unwrap();
        assert_eq!(comment_owner, "bob");
        assert_eq!(post_owner, "alice");
    }

    #[test]
    fn unpublished_posts_stay_off_the_list() {
        let db = fixture();
        db.insert_post("p1", "alice", "Public", "Body", true).unwrap();
        db.insert_post("p2", "alice", "Draft", "Body", false).unwrap();

        let listed = db.list_published_posts(10, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "p1");
        assert_eq!(db.count_published_posts().unwrap(), 1);
        assert_eq!(db.count_posts_by_user("alice").unwrap(), 2);
    }

    #[test]
    fn deleting_a_post_cascades_comments() {
        let db = fixture();
        db.insert_post("p1", "alice", "Title", "Body", true).unwrap();
        db.insert_comment("c1", "p1", "bob", "First").unwrap();

        db.delete_post("p1").unwrap();
        assert!(db.get_comment_owners("c1").unwrap().is_none());
    }

    #[test]
    fn comment_count_is_joined_in() {
        let db = fixture();
        db.insert_post("p1", "alice", "Title", "Body", true).unwrap();
        db.insert_comment("c1", "p1", "bob", "one").unwrap();
        db.insert_comment("c2", "p1", "alice", "two").unwrap();

        let post = db.get_post("p1").unwrap().unwrap();
        assert_eq!(post.comment_count, 2);
        assert_eq!(post.author_name.as_deref(), Some("Alice"));
    }
}
