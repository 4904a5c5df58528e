use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentType, VoteOutcome, VoteType};

// -- JWT Claims --

/// JWT claims shared across rounds-api (REST middleware) and rounds-notify
/// (WebSocket identify). Canonical definition lives here in rounds-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Info,
    Error,
}

/// Outcome envelope for mutations whose interesting result is a message,
/// e.g. a username update that turns out to be a no-op.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ActionStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

// -- Communities --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommunityResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDescriptionRequest {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CommunityDetailResponse {
    pub community: CommunityResponse,
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_count: i64,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub content_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostCreatedResponse {
    pub post_id: Uuid,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content_type: ContentType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub author_id: Uuid,
    pub author_username: String,
    pub community_name: String,
    pub community_slug: String,
    pub comment_count: i64,
    pub score: i64,
    /// The requesting user's live vote on this post, if any.
    pub viewer_vote: Option<VoteType>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub total_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: PostSummary,
    pub comments: Vec<CommentResponse>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Votes --

/// `vote_type` stays a raw string here so the handler can fold case before
/// validating; a typed field would reject "UPVOTE" at deserialization.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub vote_type: String,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub outcome: VoteOutcome,
    pub score: i64,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRoomRequest {
    pub target_user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room_id: Uuid,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct MessagePreview {
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub room_id: Uuid,
    pub name: Option<String>,
    pub is_direct: bool,
    /// For direct rooms, the member who is not the requester.
    pub other_user: Option<UserSummary>,
    pub last_message: Option<MessagePreview>,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RoomDetailResponse {
    pub room_id: Uuid,
    pub name: Option<String>,
    pub is_direct: bool,
    pub other_user: Option<UserSummary>,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub text: String,
}
