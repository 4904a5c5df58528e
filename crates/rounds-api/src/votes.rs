use axum::{Extension, Json, extract::{Path, State}};
use uuid::Uuid;

use rounds_types::api::{CastVoteRequest, Claims, VoteResponse};
use rounds_types::events::Invalidation;
use rounds_types::models::{VotableType, VoteType};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{run_db, to_uuid};

fn parse_vote(raw: &str) -> Result<VoteType, ApiError> {
    VoteType::parse(raw).ok_or_else(|| ApiError::InvalidInput("Invalid vote type.".into()))
}

pub async fn cast_post_vote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CastVoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = parse_vote(&req.vote_type)?;

    let (outcome, score) = run_db(&state, {
        let vote_id = Uuid::new_v4().to_string();
        let user_id = claims.sub.to_string();
        let target = post_id.to_string();
        move |db| {
            let outcome = db
                .cast_vote(&vote_id, &user_id, &target, VotableType::Post, vote)?
                .ok_or(ApiError::NotFound("post"))?;
            let score = db.score(&target, VotableType::Post)?;
            Ok((outcome, score))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::HomeFeed);
    state.notify.broadcast(Invalidation::Post { post_id });

    Ok(Json(VoteResponse { outcome, score }))
}

pub async fn cast_comment_vote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<CastVoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = parse_vote(&req.vote_type)?;

    let (outcome, score, parent_post) = run_db(&state, {
        let vote_id = Uuid::new_v4().to_string();
        let user_id = claims.sub.to_string();
        let target = comment_id.to_string();
        move |db| {
            let parent_post = db
                .comment_post_id(&target)?
                .ok_or(ApiError::NotFound("comment"))?;
            let outcome = db
                .cast_vote(&vote_id, &user_id, &target, VotableType::Comment, vote)?
                .ok_or(ApiError::NotFound("comment"))?;
            let score = db.score(&target, VotableType::Comment)?;
            Ok((outcome, score, parent_post))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Post {
        post_id: to_uuid(&parent_post),
    });

    Ok(Json(VoteResponse { outcome, score }))
}
