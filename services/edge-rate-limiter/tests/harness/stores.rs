// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Window store wrappers for observing and breaking the limiter's backend.

use async_trait::async_trait;
use edge_rate_limiter::error::Result;
use edge_rate_limiter::record::{Committed, WindowRecord};
use edge_rate_limiter::store::{Decide, WindowStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Counts transactions that reach the wrapped store.
pub struct CountingStore {
    inner: Arc<dyn WindowStore>,
    transactions: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn WindowStore>) -> Self {
        Self {
            inner,
            transactions: AtomicUsize::new(0),
        }
    }

    pub fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowStore for CountingStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        self.inner.transact(identifier, decide).await
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        self.inner.get(identifier).await
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        self.inner.delete(identifier).await
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        self.inner.delete_expired(now, limit).await
    }
}

/// Simulates a store outage that can be switched on and off.
pub struct FailingStore {
    inner: Arc<dyn WindowStore>,
    failing: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn WindowStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn outage(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            let err = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl WindowStore for FailingStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        self.outage()?;
        self.inner.transact(identifier, decide).await
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        self.outage()?;
        self.inner.get(identifier).await
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        self.outage()?;
        self.inner.delete(identifier).await
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        self.outage()?;
        self.inner.delete_expired(now, limit).await
    }
}

/// Delays every call by a fixed amount before delegating.
pub struct SlowStore {
    inner: Arc<dyn WindowStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<dyn WindowStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl WindowStore for SlowStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        tokio::time::sleep(self.delay).await;
        self.inner.transact(identifier, decide).await
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(identifier).await
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(identifier).await
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_expired(now, limit).await
    }
}

/// Holds transactions for one identifier until released; others pass through.
pub struct StallingStore {
    inner: Arc<dyn WindowStore>,
    stalled: String,
    entered: Notify,
    release: Notify,
}

impl StallingStore {
    pub fn new(inner: Arc<dyn WindowStore>, stalled: &str) -> Self {
        Self {
            inner,
            stalled: stalled.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Resolves once a transaction for the stalled identifier is parked.
    pub async fn wait_until_stalled(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl WindowStore for StallingStore {
    async fn transact(&self, identifier: &str, decide: Decide<'_>) -> Result<Committed> {
        if identifier == self.stalled {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.transact(identifier, decide).await
    }

    async fn get(&self, identifier: &str) -> Result<Option<WindowRecord>> {
        self.inner.get(identifier).await
    }

    async fn delete(&self, identifier: &str) -> Result<()> {
        self.inner.delete(identifier).await
    }

    async fn delete_expired(&self, now: i64, limit: usize) -> Result<usize> {
        self.inner.delete_expired(now, limit).await
    }
}
