// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Window records and the mutations a transaction may apply to them.

use serde::{Deserialize, Serialize};

/// Counter state for one identifier's current fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Requests admitted in the current window
    pub count: u32,
    /// End of the current window (epoch milliseconds)
    pub reset_time: i64,
}

impl WindowRecord {
    /// A freshly opened window holding the request that opened it.
    pub fn fresh(reset_time: i64) -> Self {
        Self {
            count: 1,
            reset_time,
        }
    }

    /// Whether the window is still running at `now`.
    pub fn is_live(&self, now: i64) -> bool {
        now < self.reset_time
    }
}

/// Write decided by the coordinator inside a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Overwrite with `{count: 1, reset_time}`.
    Start { reset_time: i64 },
    /// Add one to `count` using the store's atomic increment.
    Increment,
    /// Leave the record untouched.
    Abort,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Increment => "increment",
            Self::Abort => "abort",
        }
    }

    /// Whether this mutation admits the request.
    pub fn admits(&self) -> bool {
        !matches!(self, Self::Abort)
    }
}

/// Resolved outcome of a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    /// The mutation that was applied on the final attempt
    pub mutation: Mutation,
    /// Record state after the transaction (the observed state on abort)
    pub record: Option<WindowRecord>,
}

/// Read-only quota report for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStats {
    pub count: u32,
    pub remaining: u32,
    /// Window end in epoch milliseconds, `0` when no window is in effect
    pub reset_at: i64,
}

impl RateLimitStats {
    /// Report for a stored record as seen at `now`.
    ///
    /// An expired window reports as no limit in effect rather than stale data.
    pub fn from_record(record: &WindowRecord, max_requests: u32, now: i64) -> Self {
        if record.is_live(now) {
            Self {
                count: record.count,
                remaining: max_requests.saturating_sub(record.count),
                reset_at: record.reset_time,
            }
        } else {
            Self::unrestricted(max_requests)
        }
    }

    pub fn unrestricted(max_requests: u32) -> Self {
        Self {
            count: 0,
            remaining: max_requests,
            reset_at: 0,
        }
    }

    /// Milliseconds until the window resets, `0` if none is in effect.
    pub fn retry_after_ms(&self, now: i64) -> u64 {
        if self.reset_at == 0 {
            return 0;
        }
        (self.reset_at - now).max(0) as u64
    }
}
