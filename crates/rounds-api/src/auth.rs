use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use rounds_db::Database;
use rounds_notify::Dispatcher;
use rounds_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::run_db;
use crate::users::normalize_username;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub notify: Dispatcher,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = normalize_username(&req.username)?;
    if req.password.chars().count() < 8 {
        return Err(ApiError::InvalidInput(
            "Password must be at least 8 characters.".into(),
        ));
    }

    // Hash with Argon2id before touching storage
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hash failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let created = run_db(&state, {
        let id = user_id.to_string();
        let username = username.clone();
        move |db| {
            if db.get_user_by_username(&username)?.is_some() {
                return Ok(false);
            }
            Ok(db.create_user(&id, &username, &password_hash)?)
        }
    })
    .await?;
    if !created {
        return Err(ApiError::InvalidInput(
            "That username is already taken.".into(),
        ));
    }

    let token = create_token(&state.jwt_secret, user_id, &username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_lowercase();

    let user = run_db(&state, move |db| Ok(db.get_user_by_username(&username)?))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| anyhow::anyhow!("Stored hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id {:?}: {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub(crate) fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
