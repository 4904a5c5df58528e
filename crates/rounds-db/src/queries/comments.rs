use super::OptionalExt;
use crate::Database;
use crate::models::CommentRow;
use anyhow::Result;
use rusqlite::TransactionBehavior;

impl Database {
    // -- Comments --

    /// Inserts a comment and bumps the post's comment_count in the same
    /// transaction, so the denormalized count can never drift from the
    /// comment rows. Returns the stored creation timestamp, or None when
    /// the post does not exist.
    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let post_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
                .optional()?;
            if post_exists.is_none() {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, content) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, post_id, author_id, content],
            )?;
            tx.execute(
                "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
                [post_id],
            )?;
            let created_at: String = tx.query_row(
                "SELECT created_at FROM comments WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(Some(created_at))
        })
    }

    /// Parent post of a comment, for scoping invalidations of comment votes.
    pub fn comment_post_id(&self, comment_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT post_id FROM comments WHERE id = ?1",
                    [comment_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All comments on a post, oldest first.
    pub fn comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cm.id, cm.post_id, cm.author_id, u.username, cm.content, cm.created_at
                 FROM comments cm
                 LEFT JOIN users u ON u.id = cm.author_id
                 WHERE cm.post_id = ?1
                 ORDER BY cm.created_at ASC, cm.rowid ASC",
            )?;

            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{seed_community, seed_post, seed_user, test_db};
    use uuid::Uuid;

    #[test]
    fn insert_bumps_comment_count_atomically() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let community = seed_community(&db, &author, "Pediatrics", "pediatrics");
        let post = seed_post(&db, &community, &author, "case discussion");

        let mut stamps = Vec::new();
        for i in 0..3 {
            let stamp = db
                .insert_comment(&Uuid::new_v4().to_string(), &post, &author, &format!("note {}", i))
                .unwrap()
                .expect("post exists");
            stamps.push(stamp);
        }

        let row = db.get_post(&post, None).unwrap().unwrap();
        assert_eq!(row.comment_count, 3);

        let comments = db.comments_for_post(&post).unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].content, "note 0");
        assert_eq!(comments[2].content, "note 2");
        assert_eq!(comments[0].author_username, "author");
        assert_eq!(comments[0].created_at, stamps[0]);
        assert_eq!(comments[2].created_at, stamps[2]);
    }

    #[test]
    fn comment_on_missing_post_is_rejected_without_side_effects() {
        let db = test_db();
        let author = seed_user(&db, "author");

        let inserted = db
            .insert_comment(&Uuid::new_v4().to_string(), "no-such-post", &author, "hello")
            .unwrap();
        assert!(inserted.is_none());

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
