use axum::extract::{Extension, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::{TokenOut, UserOut};
use crate::app::AppState;
use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(token))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/whoami", get(whoami))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/register - Create a new account
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<UserOut> {
    let email = auth::normalize_email(&payload.email);
    if email.is_empty() {
        return Err(ApiError::field_error("email", "This field may not be blank."));
    }
    if !email.contains('@') {
        return Err(ApiError::field_error("email", "Enter a valid email address."));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::field_error("name", "This field may not be blank."));
    }
    if payload.password.chars().count() < 5 {
        return Err(ApiError::field_error(
            "password",
            "Ensure this field has at least 5 characters.",
        ));
    }

    let password_hash = auth::hash_password(&payload.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal_server_error("Failed to process password")
    })?;

    let user = state
        .store
        .create_user(&email, payload.name.trim(), &password_hash)
        .await?;
    tracing::info!(user_id = %user.id, "account registered");
    Ok(ApiResponse::created(user.into()))
}

/// POST /auth/token - Exchange email and password for a bearer token
async fn token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<TokenOut> {
    let email = auth::normalize_email(&payload.email);
    let user = state
        .store
        .user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    let verified = auth::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!("Password verification failed: {}", e);
        ApiError::unauthorized(BAD_CREDENTIALS)
    })?;
    if !verified {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let claims = Claims::new(user.email.clone(), user.id);
    let token = auth::generate_jwt(claims).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    tracing::info!(user_id = %user.id, "token issued");
    Ok(ApiResponse::success(TokenOut {
        token,
        user: user.into(),
    }))
}

/// GET /auth/whoami - Identity carried by the presented token
async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<UserOut> {
    Ok(ApiResponse::success(UserOut {
        id: user.user_id,
        email: user.email,
        name: user.name,
    }))
}
