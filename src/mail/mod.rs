// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Mail Dispatch
//!
//! Request handlers never talk to a mail transport directly. They enqueue a
//! [`MailMessage`] on the bounded [`MailQueue`]; a single [`MailWorker`] drains
//! the queue in the background and retries failed sends with exponential
//! backoff.
//!
//! ## Transports
//!
//! - [`LogTransport`] - logs the message instead of sending it (development)
//! - [`HttpRelayTransport`] - POSTs the message as JSON to a mail relay

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

mod queue;

pub use queue::{MailQueue, MailWorker, RetryPolicy, DEFAULT_QUEUE_CAPACITY};

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    /// HTML body.
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("mail transport error: {0}")]
    Transport(String),
}

/// Delivers one message. Only ever invoked from the mail worker.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Transport that only logs outgoing mail.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            target: "mail",
            to = %message.to,
            subject = %message.subject,
            "mail relay not configured; message logged only"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Upper bound on one relay request, connect included.
pub const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport posting `{from, to, subject, html}` to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
    endpoint: url::Url,
    from: String,
}

impl HttpRelayTransport {
    pub fn new(endpoint: url::Url, from: impl Into<String>) -> Result<Self, MailError> {
        Self::with_timeout(endpoint, from, RELAY_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: url::Url,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint,
            from: from.into(),
        })
    }
}

#[async_trait]
impl MailTransport for HttpRelayTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&RelayPayload {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
