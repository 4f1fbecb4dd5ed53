// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! ```rust,ignore
//! async fn me(Auth(user): Auth) -> impl IntoResponse {
//!     // user.user_id is the caller's id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::validator::bearer_token;
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// The authenticated caller.
///
/// Uses the user set by [`require_auth`](super::middleware::require_auth)
/// when present, otherwise runs the validator itself.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let user = state
            .validator
            .authenticate(parts.headers.get(AUTHORIZATION))
            .await?;
        Ok(Auth(user))
    }
}

/// Raw bearer token, if a well-formed `Authorization` header is present.
///
/// Never rejects; used where an access token is optional (logout).
pub struct MaybeBearer(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeBearer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts.headers.get(AUTHORIZATION))
            .ok()
            .map(str::to_string);
        Ok(MaybeBearer(token))
    }
}
