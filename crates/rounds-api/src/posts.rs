use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use rounds_db::models::{PostRow, parse_datetime};
use rounds_types::api::{
    Claims, CreatePostRequest, FeedResponse, PostCreatedResponse, PostDetailResponse, PostSummary,
};
use rounds_types::events::Invalidation;
use rounds_types::models::{
    ContentType, FEED_PAGE_SIZE, POST_SLUG_MAX_CHARS, POST_TITLE_MAX_CHARS, POST_TITLE_MIN_CHARS,
    VoteType,
};

use crate::auth::AppState;
use crate::communities::slugify;
use crate::comments::to_comment_response;
use crate::error::ApiError;
use crate::middleware::MaybeClaims;
use crate::{run_db, to_uuid};

// -- Validation --

fn normalize_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::InvalidInput("Post title is required.".into()));
    }
    let len = title.chars().count();
    if len < POST_TITLE_MIN_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Title must be at least {} characters.",
            POST_TITLE_MIN_CHARS
        )));
    }
    if len > POST_TITLE_MAX_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Title must be at most {} characters.",
            POST_TITLE_MAX_CHARS
        )));
    }
    Ok(title)
}

pub(crate) fn to_post_summary(row: PostRow) -> PostSummary {
    PostSummary {
        id: to_uuid(&row.id),
        title: row.title,
        slug: row.slug,
        content_type: ContentType::parse(&row.content_type).unwrap_or(ContentType::Text),
        content: row.content,
        media_url: row.media_url,
        author_id: to_uuid(&row.author_id),
        author_username: row.author_username,
        community_name: row.community_name,
        community_slug: row.community_slug,
        comment_count: row.comment_count,
        score: row.score,
        viewer_vote: row.viewer_vote.as_deref().and_then(VoteType::parse),
        created_at: parse_datetime(&row.created_at),
    }
}

// -- Handlers --

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

pub async fn home_feed(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let page = query.page.max(1);
    let viewer = claims.map(|c| c.sub.to_string());

    let (rows, total_count) = run_db(&state, move |db| {
        let offset = (i64::from(page) - 1) * i64::from(FEED_PAGE_SIZE);
        let rows = db.post_page(None, viewer.as_deref(), FEED_PAGE_SIZE, offset)?;
        let total_count = db.count_posts(None)?;
        Ok((rows, total_count))
    })
    .await?;

    Ok(Json(FeedResponse {
        posts: rows.into_iter().map(to_post_summary).collect(),
        page,
        total_count,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(community_slug): Path<String>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = normalize_title(&req.title)?;
    let content_type = ContentType::parse(&req.content_type)
        .ok_or_else(|| ApiError::InvalidInput("Invalid post type.".into()))?;

    let (content, media_url) = match content_type {
        ContentType::Text => {
            let body = req.content.as_deref().map(str::trim).unwrap_or_default();
            if body.is_empty() {
                return Err(ApiError::InvalidInput(
                    "Post content is required for text posts.".into(),
                ));
            }
            (Some(body.to_string()), None)
        }
        ContentType::Image => {
            let url = req.media_url.as_deref().map(str::trim).unwrap_or_default();
            if url.is_empty() {
                return Err(ApiError::InvalidInput(
                    "An image URL is required for image posts.".into(),
                ));
            }
            let caption = req
                .content
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from);
            (caption, Some(url.to_string()))
        }
    };

    let post_id = Uuid::new_v4();
    let post_slug: String = slugify(&title).chars().take(POST_SLUG_MAX_CHARS).collect();

    run_db(&state, {
        let id = post_id.to_string();
        let community_slug = community_slug.clone();
        let author_id = claims.sub.to_string();
        let title = title.clone();
        let post_slug = post_slug.clone();
        move |db| {
            let community = db
                .get_community_by_slug(&community_slug)?
                .ok_or(ApiError::NotFound("community"))?;
            db.insert_post(
                &id,
                &community.id,
                &author_id,
                &title,
                &post_slug,
                content_type.as_str(),
                content.as_deref(),
                media_url.as_deref(),
            )?;
            Ok(())
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::HomeFeed);
    state.notify.broadcast(Invalidation::Community {
        slug: community_slug,
    });

    Ok((
        StatusCode::CREATED,
        Json(PostCreatedResponse {
            post_id,
            slug: post_slug,
        }),
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let viewer = claims.map(|c| c.sub.to_string());

    let (post, comments) = run_db(&state, move |db| {
        let id = post_id.to_string();
        let post = db
            .get_post(&id, viewer.as_deref())?
            .ok_or(ApiError::NotFound("post"))?;
        let comments = db.comments_for_post(&id)?;
        Ok((post, comments))
    })
    .await?;

    Ok(Json(PostDetailResponse {
        post: to_post_summary(post),
        comments: comments.into_iter().map(to_comment_response).collect(),
    }))
}
