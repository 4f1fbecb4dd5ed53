// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for protected route subtrees.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
//! ```
//!
//! Rejections are returned before the handler runs, so an unauthenticated
//! request can never cause handler side effects.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::state::AppState;

/// Validate the bearer token and insert the [`AuthenticatedUser`] into the
/// request extensions.
///
/// [`AuthenticatedUser`]: super::AuthenticatedUser
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = state
        .validator
        .authenticate(request.headers().get(AUTHORIZATION))
        .await;

    match result {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, path = %request.uri().path(), "request rejected by auth middleware");
            e.into_response()
        }
    }
}
