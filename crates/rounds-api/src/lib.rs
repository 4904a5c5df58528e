//! HTTP surface for the Rounds platform: auth, communities, posts,
//! comments, votes, and direct-message chat.

pub mod auth;
pub mod chat;
pub mod comments;
pub mod communities;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod users;
pub mod votes;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

/// Runs a closure against the database on the blocking thread pool.
pub(crate) async fn run_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rounds_db::Database) -> Result<T, ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Persistence(anyhow::anyhow!("worker thread failed"))
        })?
}

/// Parses a stored uuid, logging and falling back to nil on corrupt rows.
pub(crate) fn to_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid {:?} in storage: {}", raw, e);
        Uuid::default()
    })
}

/// Builds the full application router. The caller owns outer layers
/// such as CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    // Reads work anonymously but personalize when a token is present.
    let reads = Router::new()
        .route("/feed", get(posts::home_feed))
        .route("/communities/{slug}", get(communities::get_community))
        .route("/posts/{post_id}", get(posts::get_post))
        .layer(from_fn_with_state(state.clone(), middleware::maybe_auth))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/communities", post(communities::create_community))
        .route(
            "/communities/{slug}/description",
            patch(communities::update_description),
        )
        .route("/communities/{slug}/posts", post(posts::create_post))
        .route("/posts/{post_id}/comments", post(comments::create_comment))
        .route("/posts/{post_id}/vote", post(votes::cast_post_vote))
        .route("/comments/{comment_id}/vote", post(votes::cast_comment_vote))
        .route("/users/me/username", patch(users::update_username))
        .route("/users/search", get(users::search_users))
        .route("/rooms", post(chat::open_room).get(chat::list_rooms))
        .route("/rooms/{room_id}", get(chat::get_room))
        .route("/rooms/{room_id}/messages", post(chat::send_message))
        .route(
            "/messages/{message_id}",
            patch(chat::edit_message).delete(chat::delete_message),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    let events = Router::new()
        .route("/events", get(events_upgrade))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(reads)
        .merge(protected)
        .merge(events)
}

async fn events_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        rounds_notify::stream::handle_socket(socket, state.notify.clone(), state.jwt_secret.clone())
    })
}
