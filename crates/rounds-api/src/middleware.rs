use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use rounds_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Viewer claims for public read surfaces: present when the caller sent a
/// valid token, None otherwise. Inserted unconditionally so handlers never
/// need an optional extractor.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

/// Extract and validate JWT from the Authorization header; reject the
/// request before the handler runs when there is none.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from_headers(req.headers(), &state.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Like require_auth, but anonymous callers pass through. Read surfaces use
/// the claims only to personalize (e.g. the viewer's own vote).
pub async fn maybe_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let viewer = claims_from_headers(req.headers(), &state.jwt_secret).ok();
    req.extensions_mut().insert(MaybeClaims(viewer));
    next.run(req).await
}

fn claims_from_headers(headers: &HeaderMap, secret: &str) -> Result<Claims, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    Ok(token_data.claims)
}
