//! Database row types: these map directly to SQLite rows.
//! Distinct from rounds-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

/// User fields safe to show to other users.
pub struct PublicUserRow {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

pub struct CommunityRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

/// A post joined with its author, community, and live vote aggregates.
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub author_id: String,
    pub author_username: String,
    pub community_name: String,
    pub community_slug: String,
    pub comment_count: i64,
    pub score: i64,
    pub viewer_vote: Option<String>,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

pub struct RoomRow {
    pub id: String,
    pub name: Option<String>,
    pub is_direct: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub chat_room_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub is_edited: bool,
    pub created_at: String,
}

/// Just enough of a message to authorize an edit or delete.
pub struct MessageMetaRow {
    pub id: String,
    pub chat_room_id: String,
    pub author_id: String,
    pub is_deleted: bool,
}

pub struct MessagePreviewRow {
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

/// SQLite's `datetime('now')` writes "YYYY-MM-DD HH:MM:SS" with no zone
/// marker; treat it as UTC. RFC 3339 is tried first for rows written by
/// other tooling.
pub fn parse_datetime(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Unparseable timestamp {:?}: {}", raw, e);
            DateTime::default()
        })
}
