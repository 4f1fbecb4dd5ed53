// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Every response, success or
//! failure, is wrapped in the same [`Envelope`]:
//!
//! ```json
//! { "status": "success", "message": "login successful", "data": { ... } }
//! { "status": "error", "message": "invalid credentials" }
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::Visibility;

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Uniform response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Success without a payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            data: None,
        }
    }
}

// =============================================================================
// Auth Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// At least 3 characters.
    pub username: String,
    pub email: String,
    /// At least 6 characters.
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    /// At least 6 characters.
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct TokenQuery {
    /// One-time token from the verification email.
    pub token: Option<String>,
}

// =============================================================================
// Auth Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisteredUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifiedResponse {
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoggedOutResponse {
    pub logged_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub ok: bool,
    pub user_id: u64,
}

// =============================================================================
// Repositories
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRepoRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to `private`.
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedRepoResponse {
    pub id: u64,
    pub repo_name: String,
    pub clone_url: String,
}
