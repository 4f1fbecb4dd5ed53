// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Rate Limiting
//!
//! Fixed-window request counter per client IP, kept in the KV store so every
//! server instance shares the same budget. Each request costs exactly one
//! atomic `increment`; the window starts with the first request and is not
//! extended by later ones.
//!
//! ## Response Headers
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-RateLimit-Limit` | requests allowed per window |
//! | `X-RateLimit-Remaining` | requests left in the current window |
//! | `X-RateLimit-Reset` | unix time (seconds) at which the window ends |
//! | `Retry-After` | seconds to wait, on 429 only |

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::kv::{keys, WindowCount};
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub limit: u64,
    pub window: Duration,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP`. Only safe behind a proxy
    /// that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
            trust_proxy_headers: false,
        }
    }
}

/// Client identity for rate limiting.
///
/// With `trust_proxy_headers`, the first valid IP of `X-Forwarded-For`, then
/// `X-Real-IP`. Otherwise, or when neither is usable, the peer address, else
/// `"unknown"`.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok());
    real_ip.map(str::to_string)
}

/// Whole seconds left in the window, rounded up.
fn ceil_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn apply_headers(headers: &mut HeaderMap, config: &RateLimitConfig, window: &WindowCount) {
    let remaining = config.limit.saturating_sub(window.count);
    let reset = u64::try_from(Utc::now().timestamp())
        .unwrap_or(0)
        .saturating_add(ceil_secs(window.ttl));

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(config.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
}

/// Axum middleware enforcing the fixed-window limit.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = state.rate_limit;
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, config.trust_proxy_headers);
    let key = keys::rate_limit_window(&client);

    let window = match state.kv.increment(&key, config.window).await {
        Ok(window) => window,
        Err(e) => {
            warn!(client = %client, error = %e, "rate limit check failed");
            return ApiError::too_many_requests("rate limit error").into_response();
        }
    };

    if window.count > config.limit {
        debug!(client = %client, count = window.count, "rate limit exceeded");
        let mut response = ApiError::too_many_requests("rate limit exceeded").into_response();
        apply_headers(response.headers_mut(), &config, &window);
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from(ceil_secs(window.ttl).max(1)),
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &config, &window);
    response
}
