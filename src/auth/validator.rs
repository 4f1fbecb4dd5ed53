// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-token validation.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. `Authorization` header present
//! 2. header is `Bearer <token>` (scheme case-insensitive)
//! 3. signature, format and algorithm (HS256 only)
//! 4. expiry (no leeway)
//! 5. jti present and not blacklisted
//! 6. `sub` is a decimal user id

use axum::http::HeaderValue;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::claims::{parse_subject, AuthenticatedUser, DecodedClaims};
use super::issuer::JwtKeys;
use super::revoker::SessionRevoker;
use super::AuthError;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let value = header
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct TokenValidator {
    decoding: DecodingKey,
    validation: Validation,
    revoker: SessionRevoker,
}

impl TokenValidator {
    pub fn new(keys: &JwtKeys, revoker: SessionRevoker) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding: keys.decoding.clone(),
            validation,
            revoker,
        }
    }

    /// Verify signature and expiry of a raw token.
    pub(crate) fn decode(&self, token: &str) -> Result<DecodedClaims, AuthError> {
        decode::<DecodedClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Run the full validation chain against an `Authorization` header.
    pub async fn authenticate(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let token = bearer_token(header)?;
        self.authenticate_token(token).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode(token)?;

        let jti = claims
            .jti
            .filter(|j| !j.is_empty())
            .ok_or(AuthError::InvalidToken)?;
        if self.revoker.is_blacklisted(&jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        let user_id = parse_subject(claims.sub.as_ref())?;
        Ok(AuthenticatedUser {
            user_id,
            jti,
            expires_at: claims.exp,
        })
    }

    /// `(jti, exp)` of a correctly signed, unexpired token, if any.
    ///
    /// Used by logout, which revokes whatever access token accompanies the
    /// request without failing on a bad one.
    pub fn revocable_claims(&self, token: &str) -> Option<(String, i64)> {
        let claims = self.decode(token).ok()?;
        let jti = claims.jti.filter(|j| !j.is_empty())?;
        Some((jti, claims.exp))
    }
}
