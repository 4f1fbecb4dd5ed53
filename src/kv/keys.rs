// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KV key builders.
//!
//! ```text
//! refresh:{digest}            -> user id      (7 days)
//! verify:{digest}             -> user id      (24 hours)
//! pwreset:{digest}            -> user id      (1 hour)
//! blacklist:access:{jti}      -> "1"          (until the token expires)
//! ratelimit:{client}          -> counter      (rate-limit window)
//! ```
//!
//! `digest` is the keyed token digest produced by
//! [`TokenDigester`](crate::auth::crypto::TokenDigester); raw tokens never
//! appear in keys.

/// Refresh-token record.
pub fn refresh_token(digest: &str) -> String {
    format!("refresh:{digest}")
}

/// One-time token record for the given purpose prefix.
pub fn one_time_token(prefix: &str, digest: &str) -> String {
    format!("{prefix}:{digest}")
}

/// Access-token blacklist entry.
pub fn blacklisted_jti(jti: &str) -> String {
    format!("blacklist:access:{jti}")
}

/// Fixed-window request counter for a client.
pub fn rate_limit_window(client: &str) -> String {
    format!("ratelimit:{client}")
}
