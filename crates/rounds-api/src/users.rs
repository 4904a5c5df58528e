use axum::{Extension, Json, extract::{Query, State}};
use serde::Deserialize;

use rounds_db::models::PublicUserRow;
use rounds_types::api::{ActionResponse, ActionStatus, Claims, UpdateUsernameRequest, UserSummary};
use rounds_types::models::{USERNAME_MAX_CHARS, USERNAME_MIN_CHARS};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{run_db, to_uuid};

// -- Validation --

/// Trims, lowercases, and checks a requested username. Returns the stored form.
pub(crate) fn normalize_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::InvalidInput("Username is required.".into()));
    }
    let len = username.chars().count();
    if len < USERNAME_MIN_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Username must be at least {} characters.",
            USERNAME_MIN_CHARS
        )));
    }
    if len > USERNAME_MAX_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Username must be at most {} characters.",
            USERNAME_MAX_CHARS
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ApiError::InvalidInput(
            "Username may only contain lowercase letters, numbers, underscores, and hyphens.".into(),
        ));
    }
    Ok(username)
}

pub(crate) fn to_user_summary(row: PublicUserRow) -> UserSummary {
    UserSummary {
        id: to_uuid(&row.id),
        username: row.username,
        avatar_url: row.avatar_url,
    }
}

// -- Handlers --

enum RenameOutcome {
    Renamed,
    Unchanged,
    Taken,
}

pub async fn update_username(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUsernameRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let username = normalize_username(&req.username)?;

    let outcome = run_db(&state, {
        let user_id = claims.sub.to_string();
        move |db| {
            let current = db
                .get_user_by_id(&user_id)?
                .ok_or(ApiError::NotFound("user"))?;
            if current.username == username {
                return Ok(RenameOutcome::Unchanged);
            }
            if db.set_username(&user_id, &username)? {
                Ok(RenameOutcome::Renamed)
            } else {
                Ok(RenameOutcome::Taken)
            }
        }
    })
    .await?;

    match outcome {
        RenameOutcome::Renamed => Ok(Json(ActionResponse {
            status: ActionStatus::Success,
            message: "Username updated.".into(),
        })),
        RenameOutcome::Unchanged => Ok(Json(ActionResponse {
            status: ActionStatus::Info,
            message: "Username unchanged.".into(),
        })),
        RenameOutcome::Taken => Err(ApiError::InvalidInput(
            "That username is already taken.".into(),
        )),
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let term = query.q.trim().to_string();
    if term.is_empty() {
        return Ok(Json(vec![]));
    }

    let rows = run_db(&state, {
        let me = claims.sub.to_string();
        move |db| Ok(db.search_users(&term, &me)?)
    })
    .await?;

    Ok(Json(rows.into_iter().map(to_user_summary).collect()))
}
