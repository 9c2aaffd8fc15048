// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limit coordinator.
//!
//! Implements two-tier gating:
//! 1. The process-local [`InMemoryGate`] rejects identifiers already known to
//!    be exhausted for free.
//! 2. Everything else runs one atomic transaction against the shared
//!    [`WindowStore`], which alone decides admission.
//!
//! Store failures and timeouts fail open: an unavailable limiter must not turn
//! into a denial of service for legitimate traffic.

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::{Result, StoreError};
use crate::gate::InMemoryGate;
use crate::metrics::{DecisionOutcome, LimiterMetrics};
use crate::record::{Committed, Mutation, RateLimitStats, WindowRecord};
use crate::store::WindowStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_SWEEP_BATCH_SIZE: usize = 500;

/// Resolution of one request, with the window state it was decided against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    /// Requests counted in the window after this decision, when known
    pub count: Option<u32>,
    /// End of the window this decision belongs to, when known
    pub reset_time: Option<i64>,
}

impl Decision {
    pub fn allowed(&self) -> bool {
        matches!(
            self.outcome,
            DecisionOutcome::Allowed | DecisionOutcome::FailOpen
        )
    }

    fn fail_open() -> Self {
        Self {
            outcome: DecisionOutcome::FailOpen,
            count: None,
            reset_time: None,
        }
    }
}

/// Per-identifier fixed-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn WindowStore>,
    gate: InMemoryGate,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<LimiterMetrics>>,
    sweep_batch_size: usize,
}

impl RateLimiter {
    /// Create a limiter over an already-constructed store.
    pub fn new(config: RateLimitConfig, store: Arc<dyn WindowStore>) -> Self {
        let gate = InMemoryGate::new(config.max_requests, config.gate_capacity);
        Self {
            config,
            store,
            gate,
            clock: Arc::new(SystemClock),
            metrics: None,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<LimiterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_sweep_batch_size(mut self, batch_size: usize) -> Self {
        self.sweep_batch_size = batch_size.max(1);
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn gate(&self) -> &InMemoryGate {
        &self.gate
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Admit or reject one request for `identifier`.
    ///
    /// Consumes one unit of quota when it returns `true` and none otherwise.
    pub async fn check_rate_limit(&self, identifier: &str) -> bool {
        self.check(identifier).await.allowed()
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit), reporting how the
    /// decision was reached.
    pub async fn check(&self, identifier: &str) -> Decision {
        let now = self.clock.now_ms();

        if let Some(reset_time) = self.gate.blocked_until(identifier, now) {
            debug!(identifier, reset_time, "Blocked by in-memory gate");
            return self.decided(Decision {
                outcome: DecisionOutcome::ShortCircuit,
                count: Some(self.config.max_requests),
                reset_time: Some(reset_time),
            });
        }

        let window_ms = self.config.window_millis();
        let max_requests = self.config.max_requests;
        let decide = move |current: Option<&WindowRecord>| match current {
            Some(record) if record.is_live(now) => {
                if record.count < max_requests {
                    Mutation::Increment
                } else {
                    Mutation::Abort
                }
            }
            _ => Mutation::Start {
                reset_time: now.saturating_add(window_ms),
            },
        };

        let started = Instant::now();
        let result = self
            .bounded(self.store.transact(identifier, &decide))
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_store_latency(started.elapsed());
        }

        let committed = match result {
            Ok(committed) => committed,
            Err(e) => {
                warn!(identifier, error = %e, "Window store unavailable, failing open");
                return self.decided(Decision::fail_open());
            }
        };

        let Committed { mutation, record } = committed;
        if !mutation.admits() {
            if let Some(record) = record {
                self.gate.block(identifier, record.reset_time);
            }
            debug!(identifier, "Rate limit exceeded");
            return self.decided(Decision {
                outcome: DecisionOutcome::Denied,
                count: record.map(|r| r.count),
                reset_time: record.map(|r| r.reset_time),
            });
        }

        if let Some(record) = record {
            self.gate.record(identifier, record.count, record.reset_time);
        }
        self.decided(Decision {
            outcome: DecisionOutcome::Allowed,
            count: record.map(|r| r.count),
            reset_time: record.map(|r| r.reset_time),
        })
    }

    /// Forget everything about `identifier`.
    ///
    /// Clears the store record and this process's gate. Gates in other
    /// processes keep any cached block until its window ends.
    pub async fn reset_rate_limit(&self, identifier: &str) -> Result<()> {
        let result = self.bounded(self.store.delete(identifier)).await;
        self.gate.remove(identifier);
        result?;
        info!(identifier, "Rate limit reset");
        Ok(())
    }

    /// Current quota usage, or `None` if the identifier has no record.
    pub async fn get_rate_limit_stats(&self, identifier: &str) -> Result<Option<RateLimitStats>> {
        let now = self.clock.now_ms();
        let record = self.bounded(self.store.get(identifier)).await?;
        Ok(record.map(|r| RateLimitStats::from_record(&r, self.config.max_requests, now)))
    }

    /// Delete expired records in bounded batches and prune the local gate.
    ///
    /// Returns the number of store records removed.
    pub async fn cleanup_old_entries(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let purged = self.gate.purge_expired(now);

        let mut removed = 0;
        loop {
            let batch = self
                .bounded(self.store.delete_expired(now, self.sweep_batch_size))
                .await?;
            removed += batch;
            if let Some(metrics) = &self.metrics {
                metrics.add_swept(batch);
            }
            if batch < self.sweep_batch_size {
                break;
            }
        }

        info!(removed, gate_purged = purged, "Swept expired window records");
        Ok(removed)
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    fn decided(&self, decision: Decision) -> Decision {
        if let Some(metrics) = &self.metrics {
            metrics.observe_decision(decision.outcome);
        }
        decision
    }
}
