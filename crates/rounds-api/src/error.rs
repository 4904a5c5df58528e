use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for every API surface. Each variant maps to exactly one
/// status code; the body is always {"status": "error", "message": ...} so
/// clients have a single failure shape to handle.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No valid session. Always a typed 401 response, never a redirect.
    #[error("Invalid or missing credentials.")]
    Unauthenticated,

    /// A field failed validation; the message names the field and rule.
    #[error("{0}")]
    InvalidInput(String),

    /// The referenced user cannot be messaged (self, or does not exist).
    #[error("Invalid target user.")]
    InvalidTarget,

    /// The caller does not belong to the room they are acting on.
    #[error("You are not a member of this room.")]
    NotAMember,

    /// The caller is not the owner of the thing they are modifying.
    #[error("You are not allowed to modify this {0}.")]
    Forbidden(&'static str),

    #[error("No such {0}.")]
    NotFound(&'static str),

    /// Storage failure. Logged with detail; the client gets a generic
    /// retry message with no internals.
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::InvalidTarget => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotAMember => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Persistence(err) => {
                error!("Storage failure: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_string(),
                )
            }
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}
