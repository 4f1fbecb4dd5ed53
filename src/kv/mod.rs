// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ephemeral Key-Value Store
//!
//! All cross-request auth state lives here: refresh tokens, one-time tokens,
//! the access-token blacklist and rate-limit windows. Nothing in the auth core
//! keeps shared mutable state in process; correctness relies on every
//! operation below being a single atomic call against the backend.
//!
//! ## Backends
//!
//! - [`RedisKv`] - production backend (`GETDEL`, `SET PX`, Lua `INCR`+`PEXPIRE`)
//! - [`MemoryKv`] - single-node development and tests
//!
//! ## Key Layout
//!
//! See [`keys`] for the full list of key prefixes.

use std::time::Duration;

use async_trait::async_trait;

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryKv;
pub use self::redis::RedisKv;

/// Errors raised by a KV backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("kv backend error: {0}")]
    Backend(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// Counter state returned by [`KvStore::increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Value after the increment (1 for a freshly created window).
    pub count: u64,
    /// Time left before the counter expires.
    pub ttl: Duration,
}

/// Key/value storage with per-key expiry.
///
/// Implementations must make each method a single atomic operation.
/// In particular `get_and_delete` must never let two concurrent callers
/// observe the same value.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Read a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Delete a key. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> KvResult<bool>;

    /// Check whether a live key exists.
    async fn exists(&self, key: &str) -> KvResult<bool>;

    /// Atomically increment a counter, creating it with `ttl_on_create`
    /// when absent. The expiry of an existing counter is left untouched.
    async fn increment(&self, key: &str, ttl_on_create: Duration) -> KvResult<WindowCount>;

    /// Atomically read and remove a key.
    async fn get_and_delete(&self, key: &str) -> KvResult<Option<String>>;

    /// Round-trip to the backend (used by health checks).
    async fn ping(&self) -> KvResult<()>;
}
