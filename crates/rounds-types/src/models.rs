use serde::{Deserialize, Serialize};

// -- Validation limits --

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 20;
pub const COMMUNITY_NAME_MIN_CHARS: usize = 3;
pub const COMMUNITY_NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const POST_TITLE_MIN_CHARS: usize = 3;
pub const POST_TITLE_MAX_CHARS: usize = 300;
pub const POST_SLUG_MAX_CHARS: usize = 100;
pub const COMMENT_MAX_CHARS: usize = 10_000;
pub const MESSAGE_MAX_CHARS: usize = 10_000;
pub const FEED_PAGE_SIZE: u32 = 10;

// -- Votes --

/// What a vote points at. The ledger is polymorphic: one table covers
/// posts and comments, so the target kind travels with the target id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotableType {
    Post,
    Comment,
}

impl VotableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotableType::Post => "post",
            VotableType::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    /// Parses wire input case-insensitively; storage is always lowercase.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "upvote" => Some(VoteType::Upvote),
            "downvote" => Some(VoteType::Downvote),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

/// Net effect of one vote action on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    /// No prior row existed; one was inserted.
    Created,
    /// The same direction was repeated; the row was deleted.
    Removed,
    /// The opposite direction existed; the row flipped in place.
    Switched,
}

// -- Posts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    /// Exact-match parse. Unlike votes, post types are not case-folded.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(ContentType::Text),
            "image" => Some(ContentType::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}
