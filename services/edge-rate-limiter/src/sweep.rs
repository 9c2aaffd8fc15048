// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scheduled maintenance sweep.

use crate::limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Run [`RateLimiter::cleanup_old_entries`] every `every` until aborted.
///
/// A failed run is logged and retried on the next tick; request-path checks
/// never wait on the sweep.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = limiter.cleanup_old_entries().await {
                warn!(error = %e, "Window record sweep failed");
            }
        }
    })
}
