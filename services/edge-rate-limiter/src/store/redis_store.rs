// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Redis window store for multi-instance deployments.
//!
//! Layout:
//! - `{prefix}:window:{identifier}` hash with fields `count` and `reset_time`
//! - `{prefix}:expiry` sorted set of identifiers scored by `reset_time`, used
//!   by the sweep to find expired windows in bounded batches
//!
//! Transactions are optimistic: read the record, let the caller decide, then
//! apply the write with a script that first checks the record is still exactly
//! what was read. A mismatch means another writer got there first and the cycle
//! is retried. Increments go through `HINCRBY` so the stored count is never
//! computed from a stale local copy. Every command runs over the one shared
//! `ConnectionManager`.

use super::{Decide, WindowStore};
use crate::error::{Result, StoreError};
use crate::record::{Committed, Mutation, WindowRecord};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::collections::HashMap;
use tracing::{debug, warn};

const FIELD_COUNT: &str = "count";
const FIELD_RESET_TIME: &str = "reset_time";

/// Compare-and-set of one window record.
///
/// KEYS: record hash, expiry index. ARGV: observed count (empty when the
/// record was absent), observed reset_time, operation, new reset_time,
/// identifier. Returns the new count, or nil when the record changed.
const APPLY_SCRIPT: &str = r#"
local count = redis.call('HGET', KEYS[1], 'count')
local reset = redis.call('HGET', KEYS[1], 'reset_time')
if ARGV[1] == '' then
  if count or reset then return false end
elseif count ~= ARGV[1] or reset ~= ARGV[2] then
  return false
end
if ARGV[3] == 'start' then
  redis.call('HSET', KEYS[1], 'count', 1, 'reset_time', ARGV[4])
  redis.call('ZADD', KEYS[2], ARGV[4], ARGV[5])
  return 1
end
return redis.call('HINCRBY', KEYS[1], 'count', 1)
"#;

/// Delete a batch of index candidates whose window has ended.
///
/// KEYS: expiry index, then one record hash per candidate. ARGV: now, then
/// one identifier per candidate. Renewed records are left alone; index
/// entries without a record are dropped. Returns records deleted.
const SWEEP_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local removed = 0
for i = 2, #KEYS do
  local reset = redis.call('HGET', KEYS[i], 'reset_time')
  if not reset then
    redis.call('ZREM', KEYS[1], ARGV[i])
  elseif tonumber(reset) < now then
    removed = removed + redis.call('DEL', KEYS[i])
    redis.call('ZREM', KEYS[1], ARGV[i])
  end
end
return removed
"#;

/// Redis storage backend.
pub struct RedisWindowStore {
    connection_manager: ConnectionManager,
    apply_script: Script,
    sweep_script: Script,
    key_prefix: String,
    max_retries: u32,
}

impl RedisWindowStore {
    /// Connect to Redis and verify the connection.
    pub async fn connect(url: &str, key_prefix: &str, max_retries: u32) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!(error = %e, "Failed to create Redis client for window store");
            e
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!(error = %e, "Failed to create Redis connection manager");
            e
        })?;

        let mut conn = connection_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        debug!(key_prefix, "Connected to Redis window store");

        Ok(Self {
            connection_manager,
            apply_script: Script::new(APPLY_SCRIPT),
            sweep_script: Script::new(SWEEP_SCRIPT),
            key_prefix: key_prefix.to_string(),
            max_retries: max_retries.max(1),
        })
    }

    fn record_key(&self, identifier: &str) -> String {
        format!("{}:window:{}", self.key_prefix, identifier)
    }

    fn expiry_key(&self) -> String {
        format!("{}:expiry", self.key_prefix)
    }

    fn parse_record(
        identifier: &str,
        fields: &HashMap<String, i64>,
    ) -> Result<Option<WindowRecord>> {
        if fields.is_empty() {
            return Ok(None);
        }

        let corrupt = |reason: &str| StoreError::CorruptRecord {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        let count = fields
            .get(FIELD_COUNT)
            .copied()
            .ok_or_else(|| corrupt("missing count"))?;
        let reset_time = fields
            .get(FIELD_RESET_TIME)
            .copied()
            .ok_or_else(|| corrupt("missing reset_time"))?;
        let count = u32::try_from(count).map_err(|_| corrupt("count out of range"))?;

        Ok(Some(WindowRecord { count, reset_time }))
    }

    /// Script arguments describing the record a decision was made against.
    fn observed_args(current: Option<&WindowRecord>) -> (String, String) {
        match current {
            Some(record) => (record.count.to_string(), record.reset_time.to_string()),
            None => (String::new(), String::new()),
        }
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        let key = self.record_key(identifier);
        let mut conn = self.connection_manager.clone();

        for attempt in 1..=self.max_retries {
            let fields: HashMap<String, i64> = redis::cmd("HGETALL")
                .arg(&key)
                .query_async(&mut conn)
                .await?;
            let current = Self::parse_record(identifier, &fields)?;

            let mutation = decide(current.as_ref());
            let (operation, reset_after) = match mutation {
                Mutation::Abort => {
                    return Ok(Committed {
                        mutation,
                        record: current,
                    });
                }
                Mutation::Start { reset_time } => ("start", reset_time),
                Mutation::Increment => {
                    let Some(previous) = current.as_ref() else {
                        return Err(StoreError::MissingRecord {
                            identifier: identifier.to_string(),
                            mutation: mutation.name(),
                        });
                    };
                    ("increment", previous.reset_time)
                }
            };

            let (observed_count, observed_reset) = Self::observed_args(current.as_ref());
            let reply: Option<i64> = self
                .apply_script
                .key(&key)
                .key(self.expiry_key())
                .arg(observed_count)
                .arg(observed_reset)
                .arg(operation)
                .arg(reset_after)
                .arg(identifier)
                .invoke_async(&mut conn)
                .await?;

            let Some(count) = reply else {
                debug!(identifier, attempt, "Window record changed underneath, retrying");
                continue;
            };

            return Ok(Committed {
                mutation,
                record: Some(WindowRecord {
                    count: u32::try_from(count).unwrap_or(u32::MAX),
                    reset_time: reset_after,
                }),
            });
        }

        Err(StoreError::Conflict {
            identifier: identifier.to_string(),
            attempts: self.max_retries,
        })
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        let mut conn = self.connection_manager.clone();
        let fields: HashMap<String, i64> = redis::cmd("HGETALL")
            .arg(self.record_key(identifier))
            .query_async(&mut conn)
            .await?;
        Self::parse_record(identifier, &fields)
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.record_key(identifier))
            .ignore()
            .cmd("ZREM")
            .arg(self.expiry_key())
            .arg(identifier)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        let expiry_key = self.expiry_key();
        let mut conn = self.connection_manager.clone();

        let candidates: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&expiry_key)
            .arg("-inf")
            .arg(format!("({}", now))
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        if candidates.is_empty() {
            return Ok(0);
        }

        let mut invocation = self.sweep_script.key(&expiry_key);
        invocation.arg(now);
        for identifier in &candidates {
            invocation.key(self.record_key(identifier)).arg(identifier);
        }
        let removed: i64 = invocation.invoke_async(&mut conn).await?;
        let removed = removed.max(0) as usize;

        debug!(removed, scanned = candidates.len(), "Deleted expired window records");
        Ok(removed)
    }
}
