// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token claims and authenticated user representation.

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Claims signed into every access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject: decimal user id.
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
    /// Unique token identifier, used for revocation.
    pub jti: String,
}

/// Claims as read back from an untrusted token.
///
/// `exp` is enforced by the decoder; `sub` and `jti` are checked afterwards so
/// each missing field maps to its own rejection. `sub` is kept untyped so a
/// malformed subject is reported as such rather than as a bad token.
#[derive(Debug, Deserialize)]
pub(crate) struct DecodedClaims {
    #[serde(default)]
    pub sub: Option<serde_json::Value>,
    pub exp: i64,
    #[serde(default)]
    pub jti: Option<String>,
}

/// Authenticated caller, inserted into request extensions by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub jti: String,
    /// Access token expiration (unix seconds).
    pub expires_at: i64,
}

/// Parse a `sub` claim into a user id. Accepts a decimal string or a
/// non-negative JSON integer.
pub(crate) fn parse_subject(sub: Option<&serde_json::Value>) -> Result<u64, AuthError> {
    match sub {
        Some(serde_json::Value::String(s)) => s.parse::<u64>().ok(),
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        _ => None,
    }
    .ok_or(AuthError::InvalidSubject)
}
