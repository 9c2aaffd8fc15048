// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Window record store backends.
//!
//! Provides storage implementations for window records:
//! - Redis for distributed, production use
//! - In-memory for development and single-instance deployments

mod memory;
mod redis_store;

pub use self::memory::MemoryWindowStore;
pub use self::redis_store::RedisWindowStore;

use crate::error::Result;
use crate::record::{Committed, Mutation, WindowRecord};
use async_trait::async_trait;

/// Decision function run inside a transaction.
///
/// Receives the record as currently stored and returns the write to apply.
/// Backends with optimistic concurrency call it again after a conflict, so it
/// must be free of side effects.
pub type Decide<'a> = &'a (dyn Fn(Option<&WindowRecord>) -> Mutation + Send + Sync);

/// Durable, transactional per-identifier counter storage.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Atomically read the record for `identifier`, decide, and apply.
    ///
    /// Concurrent transactions on the same identifier serialize; no admitted
    /// increment may be lost. Transactions on different identifiers must not
    /// block each other.
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed>;

    /// Read the stored record without modifying it.
    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>>;

    /// Remove the record for `identifier`, if any.
    async fn delete(&self, identifier: &str) -> Result<()>;

    /// Remove up to `limit` records with `reset_time < now`. Returns how many.
    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize>;
}
