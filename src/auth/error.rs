// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::Envelope;

/// Token validation, issuance and revocation failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header required")]
    MissingAuthHeader,

    #[error("invalid authorization header")]
    InvalidAuthHeader,

    /// Bad signature, malformed token, wrong algorithm or missing jti.
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    #[error("invalid token subject")]
    InvalidSubject,

    /// KV, signing or randomness failure. The detail is logged, never returned.
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<crate::kv::KvError> for AuthError {
    fn from(err: crate::kv::KvError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<AuthError> for crate::error::ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Internal(detail) => crate::error::ApiError::internal(detail),
            other => crate::error::ApiError::new(other.status_code(), other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(error = %detail, "authentication failed internally");
        }
        let status = self.status_code();
        (status, Json(Envelope::error(self.public_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_auth_returns_401_envelope() {
        let (status, body) = body_of(AuthError::MissingAuthHeader).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "authorization header required");
    }

    #[tokio::test]
    async fn revoked_token_returns_401() {
        let (status, body) = body_of(AuthError::TokenRevoked).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "token revoked");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let (status, body) = body_of(AuthError::Internal("redis down".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");
    }
}
