// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process KV store.
//!
//! A single mutex guards the whole map, so every trait method is atomic with
//! respect to the others. Expired entries are dropped lazily on access, and
//! every [`SWEEP_EVERY`] writes a full pass removes keys nobody reads again.
//! Deadlines use `tokio::time::Instant`, which lets tests drive expiry with a
//! paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{KvError, KvResult, KvStore, WindowCount};

/// Writes between two sweeps of expired entries.
pub const SWEEP_EVERY: u64 = 1024;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Mutex-guarded map with per-key deadlines.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
    writes: AtomicU64,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| KvError::Backend("memory store lock poisoned".to_string()))
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.lock().map(|mut entries| sweep(&mut entries, now)).unwrap_or(0)
    }

    /// Count a write and sweep when the interval is reached.
    fn record_write(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            sweep(entries, now);
        }
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        self.lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remaining lifetime of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.lock().ok()?;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }
}

fn sweep(entries: &mut HashMap<String, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.is_live(now));
    before - entries.len()
}

/// Remove `key` if its deadline has passed and return the live entry, if any.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        self.record_write(&mut entries, now);
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(live_entry(&mut entries, key, now).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(live_entry(&mut entries, key, now).is_some())
    }

    async fn increment(&self, key: &str, ttl_on_create: Duration) -> KvResult<WindowCount> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        if let Some(entry) = live_entry(&mut entries, key, now) {
            let count = entry
                .value
                .parse::<u64>()
                .map_err(|_| KvError::Backend(format!("value at {key} is not a counter")))?
                + 1;
            entry.value = count.to_string();
            return Ok(WindowCount {
                count,
                ttl: entry.expires_at - now,
            });
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: "1".to_string(),
                expires_at: now + ttl_on_create,
            },
        );
        self.record_write(&mut entries, now);
        Ok(WindowCount {
            count: 1,
            ttl: ttl_on_create,
        })
    }

    async fn get_and_delete(&self, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(entries
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn ping(&self) -> KvResult<()> {
        self.lock().map(|_| ())
    }
}
