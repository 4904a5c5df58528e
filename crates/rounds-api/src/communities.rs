use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use rounds_db::models::{CommunityRow, parse_datetime};
use rounds_types::api::{
    ActionResponse, ActionStatus, Claims, CommunityDetailResponse, CommunityResponse,
    CreateCommunityRequest, UpdateDescriptionRequest,
};
use rounds_types::events::Invalidation;
use rounds_types::models::{
    COMMUNITY_NAME_MAX_CHARS, COMMUNITY_NAME_MIN_CHARS, DESCRIPTION_MAX_CHARS, FEED_PAGE_SIZE,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::MaybeClaims;
use crate::posts::{PageQuery, to_post_summary};
use crate::{run_db, to_uuid};

// -- Validation --

/// Turns a display name into a URL slug: lowercase, alphanumerics kept,
/// whitespace runs collapsed to single hyphens.
pub(crate) fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_hyphen = false;
    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }
    slug
}

fn normalize_community_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("Community name is required.".into()));
    }
    let len = name.chars().count();
    if len < COMMUNITY_NAME_MIN_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Community name must be at least {} characters.",
            COMMUNITY_NAME_MIN_CHARS
        )));
    }
    if len > COMMUNITY_NAME_MAX_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Community name must be at most {} characters.",
            COMMUNITY_NAME_MAX_CHARS
        )));
    }
    // Punctuation stays in the name; slug derivation strips it.
    Ok(name)
}

fn normalize_description(raw: &str) -> Result<Option<String>, ApiError> {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Description must be at most {} characters.",
            DESCRIPTION_MAX_CHARS
        )));
    }
    if description.is_empty() {
        Ok(None)
    } else {
        Ok(Some(description.to_string()))
    }
}

pub(crate) fn to_community_response(row: CommunityRow) -> CommunityResponse {
    CommunityResponse {
        id: to_uuid(&row.id),
        name: row.name,
        slug: row.slug,
        description: row.description,
        created_by: to_uuid(&row.created_by),
        created_at: parse_datetime(&row.created_at),
    }
}

// -- Handlers --

pub async fn create_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommunityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = normalize_community_name(&req.name)?;
    let description = match &req.description {
        Some(d) => normalize_description(d)?,
        None => None,
    };
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::InvalidInput(
            "Community name must include at least one letter or number.".into(),
        ));
    }

    let community_id = Uuid::new_v4();
    let row = run_db(&state, {
        let id = community_id.to_string();
        let name = name.clone();
        let slug = slug.clone();
        let created_by = claims.sub.to_string();
        move |db| {
            if db.get_community_by_name(&name)?.is_some() {
                return Err(ApiError::InvalidInput(
                    "A community with this name already exists.".into(),
                ));
            }
            if !db.create_community(&id, &name, &slug, description.as_deref(), &created_by)? {
                return Err(ApiError::InvalidInput(
                    "A community with this URL already exists.".into(),
                ));
            }
            db.get_community_by_slug(&slug)?
                .ok_or(ApiError::NotFound("community"))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::HomeFeed);

    Ok((StatusCode::CREATED, Json(to_community_response(row))))
}

pub async fn update_description(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    Json(req): Json<UpdateDescriptionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let description = normalize_description(&req.description)?;

    run_db(&state, {
        let slug = slug.clone();
        let user_id = claims.sub.to_string();
        move |db| {
            let community = db
                .get_community_by_slug(&slug)?
                .ok_or(ApiError::NotFound("community"))?;
            if community.created_by != user_id {
                return Err(ApiError::Forbidden("community"));
            }
            db.update_community_description(&community.id, description.as_deref())?;
            Ok(())
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Community { slug });

    Ok(Json(ActionResponse {
        status: ActionStatus::Success,
        message: "Description updated.".into(),
    }))
}

pub async fn get_community(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CommunityDetailResponse>, ApiError> {
    let page = query.page.max(1);
    let viewer = claims.map(|c| c.sub.to_string());

    let (community, rows, total_count) = run_db(&state, move |db| {
        let community = db
            .get_community_by_slug(&slug)?
            .ok_or(ApiError::NotFound("community"))?;
        let offset = (i64::from(page) - 1) * i64::from(FEED_PAGE_SIZE);
        let rows = db.post_page(
            Some(&community.id),
            viewer.as_deref(),
            FEED_PAGE_SIZE,
            offset,
        )?;
        let total_count = db.count_posts(Some(&community.id))?;
        Ok((community, rows, total_count))
    })
    .await?;

    Ok(Json(CommunityDetailResponse {
        community: to_community_response(community),
        posts: rows.into_iter().map(to_post_summary).collect(),
        page,
        total_count,
    }))
}
