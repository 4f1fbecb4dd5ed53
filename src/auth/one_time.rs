// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time tokens for email verification and password reset.
//!
//! A token is 256 random bits, hex encoded, mailed to the account owner and
//! stored as `<prefix>:<digest> -> user id` with a purpose-specific lifetime.
//! Consumption is a single atomic get-and-delete, so a token can succeed at
//! most once even under concurrent use.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::crypto::{random_hex, TokenDigester};
use super::AuthError;
use crate::kv::{keys, KvStore};
use crate::mail::{MailMessage, MailQueue};

/// Random bytes in a one-time token (256 bits).
const ONE_TIME_TOKEN_BYTES: usize = 32;

/// What a one-time token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Verify,
    Reset,
}

impl Purpose {
    /// KV key prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Purpose::Verify => "verify",
            Purpose::Reset => "pwreset",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            Purpose::Verify => Duration::from_secs(24 * 60 * 60),
            Purpose::Reset => Duration::from_secs(60 * 60),
        }
    }

    fn link_path(self) -> &'static str {
        match self {
            Purpose::Verify => "/api/v1/auth/verify",
            Purpose::Reset => "/api/v1/auth/reset",
        }
    }

    fn message(self, to: &str, link: &str) -> MailMessage {
        let (subject, html) = match self {
            Purpose::Verify => (
                "Verify your account",
                format!("Please verify your email by clicking <a href=\"{link}\">here</a>"),
            ),
            Purpose::Reset => (
                "Password reset",
                format!("Click <a href=\"{link}\">here</a> to reset your password"),
            ),
        };
        MailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Clone)]
pub struct OneTimeTokens {
    kv: Arc<dyn KvStore>,
    digester: TokenDigester,
    mail: MailQueue,
    public_base_url: String,
}

impl OneTimeTokens {
    pub fn new(
        kv: Arc<dyn KvStore>,
        digester: TokenDigester,
        mail: MailQueue,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            digester,
            mail,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Issue a token for `user_id` and enqueue the matching mail to `email`.
    ///
    /// Returns the raw token. Enqueueing never blocks; a full queue is logged
    /// by the queue itself and does not fail this call.
    pub async fn generate(
        &self,
        purpose: Purpose,
        user_id: u64,
        email: &str,
    ) -> Result<String, AuthError> {
        self.generate_with_ttl(purpose, user_id, email, purpose.ttl())
            .await
    }

    pub async fn generate_with_ttl(
        &self,
        purpose: Purpose,
        user_id: u64,
        email: &str,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let token = random_hex(ONE_TIME_TOKEN_BYTES)?;
        let key = keys::one_time_token(purpose.prefix(), &self.digester.digest(&token));
        self.kv.set(&key, &user_id.to_string(), ttl).await?;

        let link = self.link(purpose, &token);
        self.mail.enqueue(purpose.message(email, &link));
        info!(%purpose, user_id, "one-time token issued");
        Ok(token)
    }

    /// Redeem a token. Returns the user id exactly once; afterwards, and for
    /// unknown or expired tokens, returns `None`.
    pub async fn consume(&self, purpose: Purpose, token: &str) -> Result<Option<u64>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        let key = keys::one_time_token(purpose.prefix(), &self.digester.digest(token));
        let value = self.kv.get_and_delete(&key).await?;
        let user_id = value.and_then(|v| v.parse::<u64>().ok());
        debug!(%purpose, consumed = user_id.is_some(), "one-time token redeemed");
        Ok(user_id)
    }

    fn link(&self, purpose: Purpose, token: &str) -> String {
        format!("{}{}?token={token}", self.public_base_url, purpose.link_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use tokio::sync::mpsc;

    fn tokens() -> (OneTimeTokens, Arc<MemoryKv>, mpsc::Receiver<MailMessage>) {
        let kv = Arc::new(MemoryKv::new());
        let (queue, rx) = MailQueue::channel(16);
        let tokens = OneTimeTokens::new(
            kv.clone(),
            TokenDigester::new(b"test_refresh_secret").unwrap(),
            queue,
            "http://localhost:8080/",
        );
        (tokens, kv, rx)
    }

    #[tokio::test]
    async fn generate_stores_digest_and_mails_link() {
        let (tokens, kv, mut rx) = tokens();
        let token = tokens.generate(Purpose::Verify, 9, "a@example.com").await.unwrap();
        assert_eq!(token.len(), 64);

        let stored = kv.keys_with_prefix("verify:");
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].contains(&token));

        let mail = rx.try_recv().unwrap();
        assert_eq!(mail.to, "a@example.com");
        assert_eq!(mail.subject, "Verify your account");
        assert!(mail.html.contains(&format!(
            "http://localhost:8080/api/v1/auth/verify?token={token}"
        )));
    }

    #[tokio::test]
    async fn reset_tokens_use_their_own_prefix_and_ttl() {
        let (tokens, kv, mut rx) = tokens();
        tokens.generate(Purpose::Reset, 9, "a@example.com").await.unwrap();

        let stored = kv.keys_with_prefix("pwreset:");
        assert_eq!(stored.len(), 1);
        assert!(kv.ttl(&stored[0]).unwrap() <= Duration::from_secs(3600));
        assert!(rx.try_recv().unwrap().html.contains("/api/v1/auth/reset?token="));
    }

    #[tokio::test]
    async fn token_is_consumed_exactly_once() {
        let (tokens, _kv, _rx) = tokens();
        let token = tokens.generate(Purpose::Verify, 9, "a@example.com").await.unwrap();

        assert_eq!(tokens.consume(Purpose::Verify, &token).await.unwrap(), Some(9));
        assert_eq!(tokens.consume(Purpose::Verify, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_is_bound_to_its_purpose() {
        let (tokens, _kv, _rx) = tokens();
        let token = tokens.generate(Purpose::Verify, 9, "a@example.com").await.unwrap();
        assert_eq!(tokens.consume(Purpose::Reset, &token).await.unwrap(), None);
        assert_eq!(tokens.consume(Purpose::Verify, &token).await.unwrap(), Some(9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumption_has_single_winner() {
        let (tokens, _kv, _rx) = tokens();
        let token = tokens.generate(Purpose::Reset, 3, "a@example.com").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tokens = tokens.clone();
                let token = token.clone();
                tokio::spawn(async move { tokens.consume(Purpose::Reset, &token).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_cannot_be_consumed() {
        let (tokens, _kv, _rx) = tokens();
        let token = tokens
            .generate_with_ttl(Purpose::Verify, 9, "a@example.com", Duration::from_secs(30))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(tokens.consume(Purpose::Verify, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn full_mail_queue_does_not_fail_generation() {
        let kv = Arc::new(MemoryKv::new());
        let (queue, _rx) = MailQueue::channel(1);
        let tokens = OneTimeTokens::new(
            kv,
            TokenDigester::new(b"k").unwrap(),
            queue,
            "http://localhost:8080",
        );
        tokens.generate(Purpose::Verify, 1, "a@example.com").await.unwrap();
        let second = tokens.generate(Purpose::Verify, 1, "a@example.com").await;
        assert!(second.is_ok());
    }
}
