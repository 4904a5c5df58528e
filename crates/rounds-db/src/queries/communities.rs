use super::{OptionalExt, is_unique_violation};
use crate::Database;
use crate::models::CommunityRow;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Communities --

    /// Inserts a community. Returns false when the name or slug lost a
    /// uniqueness race; callers pre-check both for distinct error messages.
    pub fn create_community(
        &self,
        id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO communities (id, name, slug, description, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, name, slug, description, created_by],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_community_by_slug(&self, slug: &str) -> Result<Option<CommunityRow>> {
        self.with_conn(|conn| query_community(conn, "slug = ?1", slug))
    }

    pub fn get_community_by_name(&self, name: &str) -> Result<Option<CommunityRow>> {
        self.with_conn(|conn| query_community(conn, "name = ?1", name))
    }

    pub fn update_community_description(&self, id: &str, description: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE communities SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![description, id],
            )?;
            Ok(())
        })
    }
}

fn query_community(conn: &Connection, filter: &str, value: &str) -> Result<Option<CommunityRow>> {
    let sql = format!(
        "SELECT id, name, slug, description, created_by, created_at FROM communities WHERE {}",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(CommunityRow {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                description: row.get(3)?,
                created_by: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}
