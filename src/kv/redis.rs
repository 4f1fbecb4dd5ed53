// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis KV backend.
//!
//! Every trait method is exactly one Redis command (or one Lua script, which
//! Redis executes atomically). Requires Redis 6.2+ for `GETDEL`.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::Script;
use async_trait::async_trait;

use super::{KvResult, KvStore, WindowCount};

/// Increment a counter and set its expiry only when the counter was created
/// by this call. Returns `{count, pttl}`.
const INCREMENT_WINDOW_LUA: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
";

/// Redis-backed store sharing one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    increment_window: Script,
}

impl RedisKv {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            increment_window: Script::new(INCREMENT_WINDOW_LUA),
        })
    }
}

/// Redis rejects `PX 0`, so sub-millisecond TTLs are rounded up.
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let found: u64 = ::redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(found > 0)
    }

    async fn increment(&self, key: &str, ttl_on_create: Duration) -> KvResult<WindowCount> {
        let mut conn = self.conn.clone();
        let (count, ttl_ms): (u64, i64) = self
            .increment_window
            .key(key)
            .arg(millis(ttl_on_create))
            .invoke_async(&mut conn)
            .await?;
        Ok(WindowCount {
            count,
            ttl: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0)),
        })
    }

    async fn get_and_delete(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = ::redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
