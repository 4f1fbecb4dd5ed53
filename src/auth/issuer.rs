// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access and refresh token issuance.
//!
//! Access tokens are HS256 JWTs that are never persisted. Refresh tokens are
//! 512-bit random strings whose keyed digest maps to the user id in the KV
//! store for the refresh lifetime. Refresh tokens are not rotated on use.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use tracing::debug;

use super::claims::AccessClaims;
use super::crypto::{random_hex, TokenDigester};
use super::AuthError;
use crate::kv::{keys, KvStore};

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Random bytes in a jti (128 bits).
const JTI_BYTES: usize = 16;

/// Random bytes in a refresh token (512 bits).
const REFRESH_TOKEN_BYTES: usize = 64;

/// HS256 key pair derived from the access secret.
#[derive(Clone)]
pub struct JwtKeys {
    pub(crate) encoding: EncodingKey,
    pub(crate) decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    keys: JwtKeys,
    kv: Arc<dyn KvStore>,
    digester: TokenDigester,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(keys: JwtKeys, kv: Arc<dyn KvStore>, digester: TokenDigester) -> Self {
        Self {
            keys,
            kv,
            digester,
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a new access token for `user_id` with a fresh jti.
    pub fn issue_access(&self, user_id: u64) -> Result<IssuedAccessToken, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.access_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat,
            exp: iat.saturating_add(ttl),
            jti: random_hex(JTI_BYTES)?,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedAccessToken {
            token,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }

    pub(crate) fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign access token: {e}")))
    }

    /// Create a refresh token for `user_id`, stored for `ttl`.
    ///
    /// Returns the raw token; only its digest is stored.
    pub async fn issue_refresh(&self, user_id: u64, ttl: Duration) -> Result<String, AuthError> {
        let token = random_hex(REFRESH_TOKEN_BYTES)?;
        let key = keys::refresh_token(&self.digester.digest(&token));
        self.kv.set(&key, &user_id.to_string(), ttl).await?;
        debug!(user_id, "refresh token issued");
        Ok(token)
    }

    /// Look up the user a refresh token belongs to.
    ///
    /// Returns `None` for unknown, expired or revoked tokens.
    pub async fn resolve_refresh(&self, token: &str) -> Result<Option<u64>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        let key = keys::refresh_token(&self.digester.digest(token));
        let value = self.kv.get(&key).await?;
        Ok(value.and_then(|v| v.parse::<u64>().ok()))
    }
}
