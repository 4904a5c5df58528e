use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use rounds_db::models::{CommentRow, parse_datetime};
use rounds_types::api::{Claims, CommentResponse, CreateCommentRequest};
use rounds_types::events::Invalidation;
use rounds_types::models::COMMENT_MAX_CHARS;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{run_db, to_uuid};

pub(crate) fn to_comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: to_uuid(&row.id),
        author_id: to_uuid(&row.author_id),
        author_username: row.author_username,
        content: row.content,
        created_at: parse_datetime(&row.created_at),
    }
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::InvalidInput("Comment text is required.".into()));
    }
    if content.chars().count() > COMMENT_MAX_CHARS {
        return Err(ApiError::InvalidInput(
            "Comment is too long (max 10,000 characters).".into(),
        ));
    }

    let comment_id = Uuid::new_v4();
    let created_at = run_db(&state, {
        let id = comment_id.to_string();
        let post_id = post_id.to_string();
        let author_id = claims.sub.to_string();
        let content = content.clone();
        move |db| {
            db.insert_comment(&id, &post_id, &author_id, &content)?
                .ok_or(ApiError::NotFound("post"))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Post { post_id });

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment_id,
            author_id: claims.sub,
            author_username: claims.username,
            content,
            created_at: parse_datetime(&created_at),
        }),
    ))
}
