use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cache invalidation scopes broadcast after a mutation commits. Each names
/// a read surface whose cached rendering is now stale; subscribers refetch,
/// they never receive the new data itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Invalidation {
    /// The paginated home feed (new post, vote moved a score).
    HomeFeed,
    /// One community page: description edit or a post created in it.
    Community { slug: String },
    /// One post's detail view: new comment or a vote on it.
    Post { post_id: Uuid },
    /// A user's conversation list: room created or activity bumped a room.
    ConversationList { user_id: Uuid },
    /// One room's message history: send, edit, or delete.
    Room { room_id: Uuid },
}

/// Client → server frames on the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamCommand {
    /// First frame after connect: authenticate with a JWT.
    Identify { token: String },
}

/// Server → client frames on the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A read surface went stale
    Invalidate(Invalidation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_wire_shape() {
        let json = serde_json::to_string(&Invalidation::HomeFeed).unwrap();
        assert_eq!(json, r#"{"scope":"home_feed"}"#);

        let json = serde_json::to_string(&Invalidation::Community {
            slug: "cardiology".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"scope":"community","slug":"cardiology"}"#);
    }

    #[test]
    fn stream_event_roundtrip() {
        let room_id = Uuid::new_v4();
        let event = StreamEvent::Invalidate(Invalidation::Room { room_id });
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        match back {
            StreamEvent::Invalidate(Invalidation::Room { room_id: got }) => {
                assert_eq!(got, room_id)
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn identify_command_parses() {
        let cmd: StreamCommand =
            serde_json::from_str(r#"{"type":"Identify","data":{"token":"abc"}}"#).unwrap();
        let StreamCommand::Identify { token } = cmd;
        assert_eq!(token, "abc");
    }
}
