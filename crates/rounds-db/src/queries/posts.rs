use super::OptionalExt;
use crate::Database;
use crate::models::PostRow;
use anyhow::Result;

/// Shared SELECT for post listings. Score and the viewer's own vote are
/// scalar subqueries so vote rows never multiply the result set; ?1 binds
/// the viewer id (or NULL), ?2 an optional community filter.
const POST_PAGE_SQL: &str = "
    SELECT p.id, p.title, p.slug, p.content_type, p.content, p.media_url,
           p.author_id, u.username, c.name, c.slug, p.comment_count,
           COALESCE((SELECT SUM(CASE v.vote_type WHEN 'upvote' THEN 1 ELSE -1 END)
                     FROM votes v
                     WHERE v.votable_id = p.id AND v.votable_type = 'post'), 0),
           (SELECT v.vote_type FROM votes v
            WHERE v.votable_id = p.id AND v.votable_type = 'post' AND v.user_id = ?1),
           p.created_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN communities c ON c.id = p.community_id";

impl Database {
    // -- Posts --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_post(
        &self,
        id: &str,
        community_id: &str,
        author_id: &str,
        title: &str,
        slug: &str,
        content_type: &str,
        content: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, community_id, author_id, title, slug, content_type, content, media_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, community_id, author_id, title, slug, content_type, content, media_url],
            )?;
            Ok(())
        })
    }

    /// One page of posts, newest first, across all communities or within
    /// one. `viewer` personalizes the viewer_vote column. `offset` is i64
    /// so page arithmetic on client-supplied numbers never wraps.
    pub fn post_page(
        &self,
        community_id: Option<&str>,
        viewer: Option<&str>,
        limit: u32,
        offset: i64,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_PAGE_SQL}
                 WHERE (?2 IS NULL OR p.community_id = ?2)
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;

            let rows = stmt
                .query_map(
                    rusqlite::params![viewer, community_id, limit, offset],
                    read_post_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_posts(&self, community_id: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE (?1 IS NULL OR community_id = ?1)",
                [community_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn get_post(&self, post_id: &str, viewer: Option<&str>) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_PAGE_SQL} WHERE p.id = ?2");
            let mut stmt = conn.prepare(&sql)?;

            let row = stmt
                .query_row(rusqlite::params![viewer, post_id], read_post_row)
                .optional()?;

            Ok(row)
        })
    }
}

fn read_post_row(row: &rusqlite::Row<'_>) -> std::result::Result<PostRow, rusqlite::Error> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content_type: row.get(3)?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        author_id: row.get(6)?,
        author_username: row.get(7)?,
        community_name: row.get(8)?,
        community_slug: row.get(9)?,
        comment_count: row.get(10)?,
        score: row.get(11)?,
        viewer_vote: row.get(12)?,
        created_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::test_util::{seed_community, seed_post, seed_user, test_db};
    use rounds_types::models::{VotableType, VoteType};
    use uuid::Uuid;

    #[test]
    fn page_orders_newest_first_with_stable_ties() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let community = seed_community(&db, &author, "Oncology", "oncology");

        let first = seed_post(&db, &community, &author, "first");
        let second = seed_post(&db, &community, &author, "second");
        let third = seed_post(&db, &community, &author, "third");

        let page = db.post_page(None, None, 10, 0).unwrap();
        let ids: Vec<&str> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![third.as_str(), second.as_str(), first.as_str()]);

        assert_eq!(page[0].community_slug, "oncology");
        assert_eq!(page[0].author_username, "author");
        assert_eq!(page[0].comment_count, 0);
        assert_eq!(page[0].score, 0);
        assert!(page[0].viewer_vote.is_none());
    }

    #[test]
    fn pagination_splits_pages() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let community = seed_community(&db, &author, "Oncology", "oncology");
        for i in 0..5 {
            seed_post(&db, &community, &author, &format!("post {}", i));
        }

        assert_eq!(db.count_posts(None).unwrap(), 5);
        let page1 = db.post_page(None, None, 2, 0).unwrap();
        let page2 = db.post_page(None, None, 2, 2).unwrap();
        let page3 = db.post_page(None, None, 2, 4).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 2);
        assert_eq!(page3.len(), 1);
        assert_eq!(page1[0].title, "post 4");
        assert_eq!(page3[0].title, "post 0");
    }

    #[test]
    fn offsets_beyond_the_table_return_empty_pages() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let community = seed_community(&db, &author, "Oncology", "oncology");
        seed_post(&db, &community, &author, "only post");

        let page = db
            .post_page(None, None, 10, (i64::from(u32::MAX) - 1) * 10)
            .unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn community_filter_restricts_page_and_count() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let onc = seed_community(&db, &author, "Oncology", "oncology");
        let derm = seed_community(&db, &author, "Dermatology", "dermatology");
        seed_post(&db, &onc, &author, "onc post");
        seed_post(&db, &derm, &author, "derm post");

        let page = db.post_page(Some(&onc), None, 10, 0).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "onc post");
        assert_eq!(db.count_posts(Some(&derm)).unwrap(), 1);
    }

    #[test]
    fn score_and_viewer_vote_come_from_the_ledger() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let community = seed_community(&db, &author, "Oncology", "oncology");
        let post = seed_post(&db, &community, &author, "scored");

        let voters: Vec<String> = (0..3)
            .map(|i| seed_user(&db, &format!("upvoter{}", i)))
            .collect();
        for v in &voters {
            db.cast_vote(&Uuid::new_v4().to_string(), v, &post, VotableType::Post, VoteType::Upvote)
                .unwrap();
        }
        let downer = seed_user(&db, "downvoter");
        db.cast_vote(&Uuid::new_v4().to_string(), &downer, &post, VotableType::Post, VoteType::Downvote)
            .unwrap();

        let anon = db.get_post(&post, None).unwrap().unwrap();
        assert_eq!(anon.score, 2);
        assert!(anon.viewer_vote.is_none());

        let as_downer = db.get_post(&post, Some(&downer)).unwrap().unwrap();
        assert_eq!(as_downer.viewer_vote.as_deref(), Some("downvote"));

        assert!(db.get_post("missing", None).unwrap().is_none());
    }
}
