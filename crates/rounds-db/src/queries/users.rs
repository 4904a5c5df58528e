use super::{OptionalExt, is_unique_violation};
use crate::Database;
use crate::models::{PublicUserRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

const SEARCH_LIMIT: u32 = 10;

impl Database {
    // -- Users --

    /// Inserts a user. Returns false when the username lost a uniqueness
    /// race after the handler's availability pre-check.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Renames a user. Returns false when the name was claimed concurrently;
    /// callers are expected to have pre-checked availability for messaging.
    pub fn set_username(&self, id: &str, username: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET username = ?1, updated_at = datetime('now') WHERE id = ?2",
                (username, id),
            );
            match updated {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Substring search over usernames, excluding the searcher. LIKE
    /// wildcards in the query are escaped so they match literally.
    pub fn search_users(&self, query: &str, exclude_id: &str) -> Result<Vec<PublicUserRow>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, avatar_url FROM users
                 WHERE username LIKE ?1 ESCAPE '\\' AND id <> ?2
                 ORDER BY username
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![pattern, exclude_id, SEARCH_LIMIT], |row| {
                    Ok(PublicUserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        avatar_url: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password, avatar_url, created_at FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                avatar_url: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password, avatar_url, created_at FROM users WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                avatar_url: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '%' || c == '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_user, test_db};

    #[test]
    fn create_and_fetch_user() {
        let db = test_db();
        let id = seed_user(&db, "dr_osler");

        let by_name = db.get_user_by_username("dr_osler").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert!(by_name.avatar_url.is_none());

        let by_id = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(by_id.username, "dr_osler");

        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected_on_insert() {
        let db = test_db();
        seed_user(&db, "dr_osler");
        assert!(!db.create_user("other-id", "dr_osler", "hash").unwrap());
        assert!(db.create_user("other-id", "dr_welby", "hash").unwrap());
    }

    #[test]
    fn set_username_reports_unique_conflict() {
        let db = test_db();
        let a = seed_user(&db, "alpha");
        seed_user(&db, "beta");

        assert!(db.set_username(&a, "gamma").unwrap());
        assert_eq!(db.get_user_by_id(&a).unwrap().unwrap().username, "gamma");

        assert!(!db.set_username(&a, "beta").unwrap());
    }

    #[test]
    fn search_excludes_caller_and_escapes_wildcards() {
        let db = test_db();
        let me = seed_user(&db, "nurse_joy");
        seed_user(&db, "nurse_ratched");
        seed_user(&db, "dr_house");

        let hits = db.search_users("nurse", &me).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "nurse_ratched");

        // '%' must not act as a wildcard
        assert!(db.search_users("%", &me).unwrap().is_empty());

        // '_' must match literally, not any-char
        let underscore = db.search_users("nurse_", &me).unwrap();
        assert_eq!(underscore.len(), 1);
    }

    #[test]
    fn escape_like_prefixes_metacharacters() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
