// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential lifecycle endpoints: registration, verification, sessions and
//! password reset.

use std::sync::LazyLock;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use regex::Regex;
use tracing::{info, warn};

use super::extract::ValidJson;
use crate::{
    auth::{MaybeBearer, Purpose},
    error::ApiError,
    models::{
        EmailRequest, Envelope, LoggedOutResponse, LoginRequest, LoginResponse, OkResponse,
        RefreshRequest, RefreshResponse, RegisterRequest, RegisteredUser, ResetPasswordRequest,
        TokenQuery, VerifiedResponse,
    },
    state::AppState,
    storage::{NewCredential, StoreError},
};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("EMAIL_REGEX is a valid regex pattern")
});

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if !EMAIL_REGEX.is_match(req.email.trim()) {
        return Err(ApiError::bad_request("invalid email address"));
    }
    validate_password(&req.password)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn duplicate_message(field: &str) -> &'static str {
    match field {
        "username" => "username already in use",
        _ => "email already registered",
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "Account created; verification mail queued", body = Envelope<RegisteredUser>),
        (status = 400, description = "Invalid payload, or email/username taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<RegisteredUser>>), ApiError> {
    validate_registration(&req)?;

    if state.credentials.find_by_email(&req.email)?.is_some() {
        return Err(ApiError::bad_request(duplicate_message("email")));
    }
    if state.credentials.find_by_username(&req.username)?.is_some() {
        return Err(ApiError::bad_request(duplicate_message("username")));
    }

    let password_hash = state.passwords.hash_async(req.password).await?;
    let credential = state
        .credentials
        .create(NewCredential {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .map_err(|e| match e {
            // Lost a race against a concurrent registration
            StoreError::Duplicate(field) => ApiError::bad_request(duplicate_message(field)),
            other => ApiError::from(other),
        })?;

    if let Err(e) = state
        .one_time
        .generate(Purpose::Verify, credential.id, &credential.email)
        .await
    {
        warn!(user_id = credential.id, error = %e, "failed to issue verification token");
    }
    info!(user_id = credential.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "registered successful",
            RegisteredUser {
                id: credential.id,
                username: credential.username,
                email: credential.email,
                verified: credential.verified,
            },
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    params(TokenQuery),
    tag = "Auth",
    responses(
        (status = 200, description = "Email verified", body = Envelope<VerifiedResponse>),
        (status = 400, description = "Missing, unknown, expired or already used token")
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Envelope<VerifiedResponse>>, ApiError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("token required"))?;

    let user_id = state
        .one_time
        .consume(Purpose::Verify, &token)
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid or expired token"))?;

    state.credentials.update_verified(user_id, true)?;
    info!(user_id, "email verified");

    Ok(Json(Envelope::success(
        "email verified",
        VerifiedResponse { verified: true },
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    request_body = EmailRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "New verification mail queued"),
        (status = 400, description = "Account already verified"),
        (status = 404, description = "No account with this email")
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::bad_request("email required"));
    }

    let credential = state
        .credentials
        .find_by_email(&req.email)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    if credential.verified {
        return Err(ApiError::bad_request("account already verified"));
    }

    state
        .one_time
        .generate(Purpose::Verify, credential.id, &credential.email)
        .await
        .map_err(|e| {
            warn!(user_id = credential.id, error = %e, "failed to issue verification token");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to send verification email",
            )
        })?;

    Ok(Json(Envelope::ok("verification email resent")))
}

/// Exchange credentials for an access/refresh token pair.
///
/// Unknown emails still pay for one password verification against a dummy
/// hash, and are reported exactly like a wrong password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Tokens issued", body = Envelope<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("email and password required"));
    }

    let credential = state.credentials.find_by_email(&req.email)?;
    let stored_hash = credential.as_ref().map(|c| c.password_hash.clone());
    let matches = state.passwords.verify_async(req.password, stored_hash).await?;

    let credential = match credential {
        Some(credential) if matches => credential,
        _ => return Err(ApiError::unauthorized("invalid credentials")),
    };
    if !credential.verified {
        return Err(ApiError::forbidden(
            "please verify your email before logging in",
        ));
    }

    let access = state.issuer.issue_access(credential.id)?;
    let refresh_token = state
        .issuer
        .issue_refresh(credential.id, state.issuer.refresh_ttl())
        .await?;
    info!(user_id = credential.id, "login successful");

    Ok(Json(Envelope::success(
        "login successful",
        LoginResponse {
            access_token: access.token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: state.issuer.access_ttl().as_secs(),
        },
    )))
}

/// Mint a new access token. The refresh token stays valid and unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "New access token", body = Envelope<RefreshResponse>),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Unknown, expired or revoked refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<Json<Envelope<RefreshResponse>>, ApiError> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh_token required"));
    }

    let user_id = state
        .issuer
        .resolve_refresh(&req.refresh_token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid refresh token"))?;

    let access = state.issuer.issue_access(user_id)?;
    Ok(Json(Envelope::success(
        "refreshed",
        RefreshResponse {
            access_token: access.token,
            expires_in: state.issuer.access_ttl().as_secs(),
        },
    )))
}

/// Revoke the refresh token and, when a correctly signed access token comes
/// along, blacklist its jti until it would have expired.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = RefreshRequest,
    tag = "Auth",
    security((), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Session revoked", body = Envelope<LoggedOutResponse>),
        (status = 400, description = "Missing refresh token")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    MaybeBearer(bearer): MaybeBearer,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<Json<Envelope<LoggedOutResponse>>, ApiError> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh_token required"));
    }

    state.revoker.revoke_refresh(&req.refresh_token).await?;

    if let Some((jti, expires_at)) = bearer
        .as_deref()
        .and_then(|token| state.validator.revocable_claims(token))
    {
        state.revoker.blacklist_until(&jti, expires_at).await?;
    }

    Ok(Json(Envelope::success(
        "logged out",
        LoggedOutResponse { logged_out: true },
    )))
}

/// Always answers 200 so the endpoint cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/api/v1/auth/request-password-reset",
    request_body = EmailRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Reset mail queued if the account exists", body = Envelope<OkResponse>),
        (status = 400, description = "Missing email")
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<Json<Envelope<OkResponse>>, ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::bad_request("email required"));
    }

    match state.credentials.find_by_email(&req.email) {
        Ok(Some(credential)) => {
            if let Err(e) = state
                .one_time
                .generate(Purpose::Reset, credential.id, &credential.email)
                .await
            {
                warn!(user_id = credential.id, error = %e, "failed to issue reset token");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "credential lookup failed during reset request"),
    }

    Ok(Json(Envelope::success(
        "please check your email",
        OkResponse { ok: true },
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Password replaced", body = Envelope<OkResponse>),
        (status = 400, description = "Missing fields, weak password, or invalid token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<Json<Envelope<OkResponse>>, ApiError> {
    if req.token.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("token and password required"));
    }
    // Checked before consuming so a weak password does not burn the token
    validate_password(&req.password)?;

    let user_id = state
        .one_time
        .consume(Purpose::Reset, &req.token)
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid or expired token"))?;

    let password_hash = state.passwords.hash_async(req.password).await?;
    state
        .credentials
        .update_password_hash(user_id, &password_hash)?;
    info!(user_id, "password reset");

    Ok(Json(Envelope::success(
        "password updated",
        OkResponse { ok: true },
    )))
}
