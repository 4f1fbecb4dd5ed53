// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session revocation: refresh-token deletion and the access-token blacklist.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::crypto::TokenDigester;
use super::AuthError;
use crate::kv::{keys, KvStore};

/// Shortest blacklist entry; tokens at or past expiry still get one second.
const MIN_BLACKLIST_TTL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct SessionRevoker {
    kv: Arc<dyn KvStore>,
    digester: TokenDigester,
}

impl SessionRevoker {
    pub fn new(kv: Arc<dyn KvStore>, digester: TokenDigester) -> Self {
        Self { kv, digester }
    }

    /// Delete a refresh token. Unknown tokens are not an error.
    pub async fn revoke_refresh(&self, token: &str) -> Result<(), AuthError> {
        let key = keys::refresh_token(&self.digester.digest(token));
        let removed = self.kv.delete(&key).await?;
        debug!(removed, "refresh token revoked");
        Ok(())
    }

    /// Blacklist an access-token id for `ttl`.
    pub async fn blacklist(&self, jti: &str, ttl: Duration) -> Result<(), AuthError> {
        let ttl = ttl.max(MIN_BLACKLIST_TTL);
        self.kv.set(&keys::blacklisted_jti(jti), "1", ttl).await?;
        debug!(jti, ttl_secs = ttl.as_secs(), "access token blacklisted");
        Ok(())
    }

    /// Blacklist an access-token id until the token's own expiry.
    pub async fn blacklist_until(&self, jti: &str, expires_at: i64) -> Result<(), AuthError> {
        self.blacklist(jti, remaining_lifetime(expires_at, Utc::now().timestamp()))
            .await
    }

    pub async fn is_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self.kv.exists(&keys::blacklisted_jti(jti)).await?)
    }
}

fn remaining_lifetime(expires_at: i64, now: i64) -> Duration {
    let secs = expires_at.saturating_sub(now);
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}
