use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                avatar_url  TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE communities (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                slug        TEXT NOT NULL UNIQUE,
                description TEXT,
                created_by  TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id            TEXT PRIMARY KEY,
                community_id  TEXT NOT NULL REFERENCES communities(id),
                author_id     TEXT NOT NULL REFERENCES users(id),
                title         TEXT NOT NULL,
                slug          TEXT NOT NULL,
                content_type  TEXT NOT NULL CHECK (content_type IN ('text', 'image')),
                content       TEXT,
                media_url     TEXT,
                comment_count INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_community ON posts(community_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id),
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            -- One ledger for post and comment votes. The UNIQUE constraint
            -- is the at-most-one-vote invariant; votable_id is not a foreign
            -- key because it points at two tables.
            CREATE TABLE votes (
                id           TEXT PRIMARY KEY,
                votable_id   TEXT NOT NULL,
                votable_type TEXT NOT NULL CHECK (votable_type IN ('post', 'comment')),
                user_id      TEXT NOT NULL REFERENCES users(id),
                vote_type    TEXT NOT NULL CHECK (vote_type IN ('upvote', 'downvote')),
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, votable_id, votable_type)
            );

            CREATE INDEX idx_votes_votable ON votes(votable_id, votable_type);

            CREATE TABLE chat_rooms (
                id          TEXT PRIMARY KEY,
                name        TEXT,
                is_direct   INTEGER NOT NULL DEFAULT 0,
                direct_key  TEXT UNIQUE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE chat_room_members (
                chat_room_id TEXT NOT NULL REFERENCES chat_rooms(id),
                member_id    TEXT NOT NULL REFERENCES users(id),
                last_read_at TEXT,
                PRIMARY KEY (chat_room_id, member_id)
            );

            CREATE INDEX idx_room_members_member ON chat_room_members(member_id);

            CREATE TABLE messages (
                id           TEXT PRIMARY KEY,
                chat_room_id TEXT NOT NULL REFERENCES chat_rooms(id),
                author_id    TEXT NOT NULL REFERENCES users(id),
                text         TEXT NOT NULL,
                is_edited    INTEGER NOT NULL DEFAULT 0,
                is_deleted   INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_room ON messages(chat_room_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
