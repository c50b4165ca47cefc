use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use crate::AppState;

pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    tracing::info!(username = %request.username, "registration attempt");

    let registration_enabled = state.settings.bool("auth.registration_enabled", true).await;
    let max_users = state.settings.int("auth.max_users", 0).await;

    let user = state
        .auth
        .register(
            &request.username,
            &request.email,
            &request.password,
            registration_enabled,
            max_users,
        )
        .await
        .map_err(|e| {
            tracing::warn!(username = %request.username, error = %e, "registration failed");
            e
        })?;

    let token = state.auth.issue_token(&user)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: state.auth.token_ttl_secs(),
            user: UserProfile::from(user),
        }),
    ))
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    tracing::info!(username = %request.username, "login attempt");

    let (user, token) = state
        .auth
        .login(&request.username, &request.password)
        .await
        .map_err(|e| {
            tracing::warn!(username = %request.username, error = %e, "login failed");
            e
        })?;

    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(AuthResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.token_ttl_secs(),
        user: UserProfile::from(user),
    }))
}

#[derive(Debug, Serialize)]
pub struct SetupStatusResponse {
    pub setup_required: bool,
}

/// Whether this instance still needs its first admin account created.
pub async fn setup_status_handler(
    State(state): State<AppState>,
) -> Result<Json<SetupStatusResponse>> {
    let user_count = state.entities.users.count().await?;
    Ok(Json(SetupStatusResponse { setup_required: user_count == 0 }))
}

/// Creates the first admin user. Rejects once any user already exists —
/// after that, accounts go through `register_handler` instead.
pub async fn setup_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    if state.entities.users.count().await? > 0 {
        return Err(AppError::Conflict { message: "setup already completed".to_string() });
    }

    let user = state
        .auth
        .register(&request.username, &request.email, &request.password, true, 0)
        .await?;
    let token = state.auth.issue_token(&user)?;
    tracing::info!(user_id = %user.id, "initial admin account created via setup");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: state.auth.token_ttl_secs(),
            user: UserProfile::from(user),
        }),
    ))
}

pub async fn me_handler(
    user: crate::models::user::AuthenticatedUser,
) -> Json<UserProfile> {
    Json(UserProfile::from(user.user))
}

#[derive(Debug, Deserialize)]
pub struct PlexPinQuery {
    #[allow(dead_code)]
    pub client_identifier: Option<String>,
}

/// The PIN-polling half of the Plex OAuth dance. Not implemented: this
/// service only verifies a bearer token against a required Plex section,
/// not the handshake that mints one.
pub async fn plex_pin_handler() -> Result<Json<serde_json::Value>> {
    Err(AppError::external_unavailable("plex oauth"))
}

pub async fn plex_callback_handler() -> Result<Json<serde_json::Value>> {
    Err(AppError::external_unavailable("plex oauth"))
}
