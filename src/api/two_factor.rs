//! Two-factor authentication endpoints (`/api/v1/2fa`)

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    api::{client_ip, record_action, user_agent},
    middleware::AuthUser,
    models::{
        BackupCodesRemaining, BackupCodesResponse, DisableTwoFactorRequest,
        EnableTwoFactorResponse, NewAdminAction, ProvisioningUriResponse, TrustedDevice,
        TwoFactorStatus, User, VerifySetupRequest, VerifyTwoFactorRequest,
        VerifyTwoFactorResponse,
    },
    services::{AuthService, SecondFactor, TwoFactorService},
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/enable", post(enable))
        .route("/qr-code", get(qr_code))
        .route("/verify-setup", post(verify_setup))
        .route("/verify", post(verify))
        .route("/disable", post(disable))
        .route("/backup-codes/generate", post(generate_backup_codes))
        .route("/backup-codes/remaining", get(backup_codes_remaining))
        .route("/devices", get(list_devices))
        .route("/devices/{id}", delete(revoke_device))
        .route("/status", get(status))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

fn service(state: &AppState) -> TwoFactorService<'_> {
    TwoFactorService::new(&state.db, &state.config.two_factor)
}

async fn current_user(state: &AppState, auth_user: &AuthUser) -> AppResult<User> {
    AuthService::new(state.db.clone())
        .get_user_by_id(&auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

fn user_action(auth_user: &AuthUser, action: &str) -> NewAdminAction {
    NewAdminAction::new(action, "user")
        .by(auth_user.id, &auth_user.username)
        .resource(auth_user.id)
}

async fn enable(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<EnableTwoFactorResponse>> {
    let user = current_user(&state, &auth_user).await?;
    let response = service(&state).begin_setup(&user).await?;
    record_action(&state, user_action(&auth_user, "2fa_setup_started")).await;
    Ok(Json(response))
}

async fn qr_code(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ProvisioningUriResponse>> {
    let user = current_user(&state, &auth_user).await?;
    Ok(Json(service(&state).provisioning_uri(&user).await?))
}

async fn verify_setup(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<VerifySetupRequest>,
) -> AppResult<Json<MessageResponse>> {
    service(&state)
        .verify_setup(auth_user.id, &payload.totp_code)
        .await?;
    record_action(&state, user_action(&auth_user, "2fa_enabled")).await;
    tracing::info!("Two-factor authentication enabled for {}", auth_user.username);
    Ok(MessageResponse::new("Two-factor authentication enabled"))
}

async fn verify(
    State(state): State<AppState>,
    auth_user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<VerifyTwoFactorRequest>,
) -> AppResult<Json<VerifyTwoFactorResponse>> {
    if payload.totp_code.is_none() && payload.backup_code.is_none() {
        return Err(AppError::bad_request("totp_code or backup_code is required"));
    }

    let service = service(&state);
    let proof = SecondFactor {
        totp_code: payload.totp_code.as_deref(),
        backup_code: payload.backup_code.as_deref(),
        device_token: None,
    };
    let method = match service.verify_code(auth_user.id, &proof).await {
        Ok(method) => method,
        Err(e) => {
            record_action(&state, user_action(&auth_user, "2fa_verify").failed()).await;
            return Err(e.into());
        }
    };

    let mut response = VerifyTwoFactorResponse {
        verified: true,
        method,
        device_token: None,
        device_expires_at: None,
    };

    if payload.trust_device {
        let issued = service
            .trust_device(
                auth_user.id,
                payload.device_name,
                client_ip(&headers),
                user_agent(&headers),
            )
            .await?;
        response.device_expires_at = Some(issued.device.expires_at);
        response.device_token = Some(issued.token);
        record_action(
            &state,
            user_action(&auth_user, "2fa_device_trusted")
                .details(serde_json::json!({ "device_id": issued.device.id })),
        )
        .await;
    }

    Ok(Json(response))
}

async fn disable(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<DisableTwoFactorRequest>,
) -> AppResult<Json<MessageResponse>> {
    let user = current_user(&state, &auth_user).await?;
    if !AuthService::verify_password(&payload.password, &user.password_hash)? {
        record_action(&state, user_action(&auth_user, "2fa_disabled").failed()).await;
        return Err(AppError::unauthorized("Invalid password"));
    }

    service(&state)
        .disable(auth_user.id, payload.totp_code.as_deref())
        .await?;
    record_action(&state, user_action(&auth_user, "2fa_disabled")).await;
    tracing::info!("Two-factor authentication disabled for {}", auth_user.username);
    Ok(MessageResponse::new("Two-factor authentication disabled"))
}

async fn generate_backup_codes(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<BackupCodesResponse>> {
    let backup_codes = service(&state).regenerate_backup_codes(auth_user.id).await?;
    record_action(&state, user_action(&auth_user, "2fa_backup_codes_regenerated")).await;
    Ok(Json(BackupCodesResponse {
        backup_codes,
        message: "Store these codes somewhere safe; previous codes no longer work".to_string(),
    }))
}

async fn backup_codes_remaining(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<BackupCodesRemaining>> {
    Ok(Json(service(&state).backup_codes_remaining(auth_user.id).await?))
}

async fn list_devices(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<TrustedDevice>>> {
    Ok(Json(service(&state).list_devices(auth_user.id).await?))
}

async fn revoke_device(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let device_id = parse_id(&id, "device")?;
    service(&state).revoke_device(auth_user.id, device_id).await?;
    record_action(
        &state,
        user_action(&auth_user, "2fa_device_revoked")
            .details(serde_json::json!({ "device_id": device_id })),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn status(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<TwoFactorStatus>> {
    Ok(Json(service(&state).status(auth_user.id).await?))
}
