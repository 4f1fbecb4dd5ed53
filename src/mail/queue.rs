// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded mail queue and its background worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{MailMessage, MailTransport};

/// Default number of messages waiting for delivery before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Handle used by request handlers to schedule mail.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<MailMessage>,
}

impl MailQueue {
    /// Create a queue and the receiver its worker drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MailMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Schedule `message` without waiting.
    ///
    /// Returns `false` when the message was dropped because the queue is full
    /// or the worker has stopped. Dropping is logged and never fails the caller.
    pub fn enqueue(&self, message: MailMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(target: "mail", to = %message.to, subject = %message.subject, "mail queue full; message dropped");
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(target: "mail", to = %message.to, subject = %message.subject, "mail worker stopped; message dropped");
                false
            }
        }
    }
}

/// Retry schedule for failed deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, 500ms doubling up to 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based count of failures so far).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Drains the mail queue, one message at a time.
pub struct MailWorker {
    rx: mpsc::Receiver<MailMessage>,
    transport: Arc<dyn MailTransport>,
    policy: RetryPolicy,
}

impl MailWorker {
    pub fn new(rx: mpsc::Receiver<MailMessage>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            rx,
            transport,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run until the cancellation token fires or every queue handle is dropped.
    ///
    /// ```rust,ignore
    /// tokio::spawn(worker.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            max_attempts = self.policy.max_attempts,
            "Mail worker starting"
        );

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(message) => {
                        let to = message.to.clone();
                        tokio::select! {
                            _ = self.deliver(message) => {}
                            _ = shutdown.cancelled() => {
                                warn!(target: "mail", to = %to, pending = self.rx.len(), "Mail worker shutting down mid-delivery");
                                return;
                            }
                        }
                    }
                    None => {
                        info!("Mail queue closed; mail worker stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!(pending = self.rx.len(), "Mail worker shutting down");
                    return;
                }
            }
        }
    }

    async fn deliver(&self, message: MailMessage) {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.transport.send(&message).await {
                Ok(()) => {
                    info!(target: "mail", to = %message.to, subject = %message.subject, attempt, "mail sent");
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    debug!(
                        target: "mail",
                        to = %message.to,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "mail send failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        target: "mail",
                        to = %message.to,
                        subject = %message.subject,
                        attempts = attempt,
                        error = %e,
                        "mail delivery failed"
                    );
                }
            }
        }
    }
}
