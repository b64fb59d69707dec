//! Authentication API endpoints
//!
//! Login (with the second factor when enabled), token refresh, logout and
//! the current-user lookup.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    api::{client_ip, record_action},
    middleware::auth::{
        create_access_token, create_refresh_token, validate_token, AuthUser, TokenType,
    },
    models::{AuthResponse, LoginRequest, NewAdminAction, RefreshTokenRequest, User, UserPublic},
    services::{AuthService, LoginCheck, SecondFactor, TwoFactorService},
    utils::{AppError, AppResult},
    AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let auth = &state.config.auth;

    let access_token = create_access_token(&user, &auth.jwt_secret, auth.token_expiry_hours)
        .map_err(|e| AppError::internal(format!("Failed to create access token: {}", e)))?;

    let refresh_token =
        create_refresh_token(&user, &auth.jwt_secret, auth.refresh_token_expiry_days)
            .map_err(|e| AppError::internal(format!("Failed to create refresh token: {}", e)))?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: auth.token_expiry_hours * 3600,
        user: user.into(),
    })
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let ip = client_ip(&headers);
    let auth_service = AuthService::new(state.db.clone());

    let Some(user) = auth_service
        .authenticate(&payload.username, &payload.password)
        .await?
    else {
        tracing::info!("Failed login for {}", payload.username);
        let mut action = NewAdminAction::new("login", "user")
            .details(serde_json::json!({ "username": payload.username }))
            .failed();
        action.ip_address = ip;
        record_action(&state, action).await;
        return Err(AppError::unauthorized("Invalid username or password"));
    };

    if !user.is_active {
        return Err(AppError::forbidden("User account is disabled"));
    }

    let proof = SecondFactor {
        totp_code: payload.totp_code.as_deref(),
        backup_code: payload.backup_code.as_deref(),
        device_token: payload.device_token.as_deref(),
    };
    let two_factor = TwoFactorService::new(&state.db, &state.config.two_factor);
    match two_factor.check_login(user.id, &proof).await? {
        LoginCheck::NotRequired | LoginCheck::Passed(_) => {}
        LoginCheck::Required => {
            return Err(AppError::Challenge {
                code: "TWO_FACTOR_REQUIRED",
                message: "Two-factor authentication code required".to_string(),
            });
        }
        LoginCheck::Failed => {
            let mut action = NewAdminAction::new("login", "user")
                .by(user.id, &user.username)
                .details(serde_json::json!({ "reason": "invalid second factor" }))
                .failed();
            action.ip_address = ip;
            record_action(&state, action).await;
            return Err(AppError::unauthorized("Invalid two-factor authentication code"));
        }
    }

    let mut action = NewAdminAction::new("login", "user")
        .by(user.id, &user.username)
        .resource(user.id);
    action.ip_address = ip;
    record_action(&state, action).await;

    tracing::info!("User {} logged in", user.username);
    Ok(Json(issue_tokens(&state, user)?))
}

/// POST /api/v1/auth/refresh
async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_data = validate_token(&payload.refresh_token, &state.config.auth.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired refresh token"))?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Invalid token type"));
    }

    let user_id = uuid::Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::unauthorized("Invalid user ID in token"))?;

    let user = AuthService::new(state.db.clone())
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    if !user.is_active {
        return Err(AppError::forbidden("User account is disabled"));
    }

    Ok(Json(issue_tokens(&state, user)?))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless; the client discards them.
async fn logout() -> Json<LogoutResponse> {
    Json(LogoutResponse {
        message: "Successfully logged out".to_string(),
    })
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<UserPublic>> {
    let user = AuthService::new(state.db.clone())
        .get_user_by_id(&auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(user.into()))
}
