use super::{OptionalExt, is_unique_violation};
use crate::Database;
use crate::models::{MessageMetaRow, MessagePreviewRow, MessageRow, PublicUserRow, RoomRow};
use anyhow::Result;
use rusqlite::TransactionBehavior;

impl Database {
    // -- Rooms --

    /// Resolves the direct room for a user pair, creating it on first
    /// contact. Scan and create run in one transaction; the UNIQUE
    /// direct_key column is the backstop when two first messages race.
    /// Returns the room id and whether this call created it.
    pub fn get_or_create_direct_room(
        &self,
        new_room_id: &str,
        user_a: &str,
        user_b: &str,
    ) -> Result<(String, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT r.id FROM chat_rooms r
                     JOIN chat_room_members a ON a.chat_room_id = r.id AND a.member_id = ?1
                     JOIN chat_room_members b ON b.chat_room_id = r.id AND b.member_id = ?2
                     WHERE r.is_direct = 1
                     LIMIT 1",
                    [user_a, user_b],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok((id, false));
            }

            let key = direct_key(user_a, user_b);
            let inserted = tx.execute(
                "INSERT INTO chat_rooms (id, is_direct, direct_key) VALUES (?1, 1, ?2)",
                rusqlite::params![new_room_id, key],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    // Lost the race; the winner's row is committed, fetch it.
                    let id = tx.query_row(
                        "SELECT id FROM chat_rooms WHERE direct_key = ?1",
                        [&key],
                        |row| row.get(0),
                    )?;
                    return Ok((id, false));
                }
                Err(e) => return Err(e.into()),
            }

            tx.execute(
                "INSERT INTO chat_room_members (chat_room_id, member_id) VALUES (?1, ?2)",
                [new_room_id, user_a],
            )?;
            tx.execute(
                "INSERT INTO chat_room_members (chat_room_id, member_id) VALUES (?1, ?2)",
                [new_room_id, user_b],
            )?;

            tx.commit()?;
            Ok((new_room_id.to_string(), true))
        })
    }

    /// Rooms the user belongs to, most recently active first.
    pub fn rooms_for_user(&self, member_id: &str) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.is_direct, r.created_at, r.updated_at
                 FROM chat_room_members m
                 JOIN chat_rooms r ON r.id = m.chat_room_id
                 WHERE m.member_id = ?1
                 ORDER BY r.updated_at DESC, r.rowid DESC",
            )?;

            let rows = stmt
                .query_map([member_id], read_room_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_room(&self, room_id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, is_direct, created_at, updated_at FROM chat_rooms WHERE id = ?1",
            )?;
            let row = stmt.query_row([room_id], read_room_row).optional()?;
            Ok(row)
        })
    }

    pub fn is_room_member(&self, room_id: &str, member_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM chat_room_members WHERE chat_room_id = ?1 AND member_id = ?2",
                    [room_id, member_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hit.is_some())
        })
    }

    /// For a direct room, the member who is not `member_id`.
    pub fn other_room_member(&self, room_id: &str, member_id: &str) -> Result<Option<PublicUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.avatar_url
                 FROM chat_room_members m
                 JOIN users u ON u.id = m.member_id
                 WHERE m.chat_room_id = ?1 AND m.member_id <> ?2
                 LIMIT 1",
            )?;

            let row = stmt
                .query_row([room_id, member_id], |row| {
                    Ok(PublicUserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        avatar_url: row.get(2)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Messages from other members newer than the user's read marker.
    /// A NULL marker means the user has never opened the room.
    pub fn unread_count(&self, room_id: &str, member_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 WHERE m.chat_room_id = ?1
                   AND m.author_id <> ?2
                   AND m.is_deleted = 0
                   AND m.created_at > COALESCE(
                       (SELECT last_read_at FROM chat_room_members
                        WHERE chat_room_id = ?1 AND member_id = ?2), '')",
                [room_id, member_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn mark_room_read(&self, room_id: &str, member_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE chat_room_members SET last_read_at = datetime('now')
                 WHERE chat_room_id = ?1 AND member_id = ?2",
                [room_id, member_id],
            )?;
            Ok(())
        })
    }

    /// Newest visible message in a room, for conversation list previews.
    pub fn last_message(&self, room_id: &str) -> Result<Option<MessagePreviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT author_id, text, created_at FROM messages
                 WHERE chat_room_id = ?1 AND is_deleted = 0
                 ORDER BY rowid DESC
                 LIMIT 1",
            )?;

            let row = stmt
                .query_row([room_id], |row| {
                    Ok(MessagePreviewRow {
                        author_id: row.get(0)?,
                        text: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    // -- Messages --

    /// Stores a message and bumps the room's activity timestamp in the
    /// same transaction, so conversation lists reorder atomically with
    /// the send. Returns the stored creation timestamp.
    pub fn insert_message(&self, id: &str, room_id: &str, author_id: &str, text: &str) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "INSERT INTO messages (id, chat_room_id, author_id, text) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, room_id, author_id, text],
            )?;
            tx.execute(
                "UPDATE chat_rooms SET updated_at = datetime('now') WHERE id = ?1",
                [room_id],
            )?;
            let created_at: String = tx.query_row(
                "SELECT created_at FROM messages WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(created_at)
        })
    }

    /// One page of a room's visible messages, newest first. `before` is a
    /// message id cursor for loading older history.
    pub fn room_messages(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_room_id, m.author_id, u.username, m.text, m.is_edited, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON u.id = m.author_id
                 WHERE m.chat_room_id = ?1
                   AND m.is_deleted = 0
                   AND (?2 IS NULL OR m.rowid < (SELECT rowid FROM messages WHERE id = ?2))
                 ORDER BY m.rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![room_id, before, limit], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_room_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        text: row.get(4)?,
                        is_edited: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_message(&self, message_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_room_id, m.author_id, u.username, m.text, m.is_edited, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON u.id = m.author_id
                 WHERE m.id = ?1",
            )?;

            let row = stmt
                .query_row([message_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_room_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        text: row.get(4)?,
                        is_edited: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    pub fn get_message_meta(&self, message_id: &str) -> Result<Option<MessageMetaRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_room_id, author_id, is_deleted FROM messages WHERE id = ?1",
            )?;

            let row = stmt
                .query_row([message_id], |row| {
                    Ok(MessageMetaRow {
                        id: row.get(0)?,
                        chat_room_id: row.get(1)?,
                        author_id: row.get(2)?,
                        is_deleted: row.get(3)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    pub fn edit_message(&self, message_id: &str, text: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE messages SET text = ?1, is_edited = 1 WHERE id = ?2",
                [text, message_id],
            )?;
            Ok(())
        })
    }

    /// Soft delete: the row stays for audit, every read path filters it.
    pub fn soft_delete_message(&self, message_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE messages SET is_deleted = 1 WHERE id = ?1",
                [message_id],
            )?;
            Ok(())
        })
    }
}

fn read_room_row(row: &rusqlite::Row<'_>) -> std::result::Result<RoomRow, rusqlite::Error> {
    Ok(RoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_direct: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Canonical key for a direct pair: the two ids sorted, colon-joined, so
/// (a, b) and (b, a) collide on the same UNIQUE value.
fn direct_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}
