// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Process-local first gate.
//!
//! Mirrors the counter state this process has recently observed so that
//! identifiers already known to be exhausted are rejected without a store
//! round-trip. The gate only ever says "maybe allowed" or "certainly blocked
//! until `reset_time`"; the store remains the sole authority for admission.
//!
//! Concurrency contract: the gate is shared by every handler task on the
//! runtime and guards its state with a single mutex. Each operation is a
//! short, non-blocking critical section of at most O(log n) work and is never
//! held across an `.await`.
//!
//! Eviction: the gate holds at most `capacity` identifiers. Inserting a new
//! identifier into a full gate evicts, in order of preference:
//! 1. the expired entry whose window ended first,
//! 2. the open (not exhausted) entry whose window ends soonest,
//! 3. the exhausted entry whose window ends soonest.
//!
//! Only exhausted entries save store transactions, so they are the last to
//! go. "Expired" is judged against the latest `now` any caller has passed in.
//! The sweep additionally purges expired entries on every run.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct GateEntry {
    count: u32,
    reset_time: i64,
}

/// Map plus two eviction orders keyed by `(reset_time, identifier)`.
#[derive(Debug, Default)]
struct GateState {
    entries: HashMap<String, GateEntry>,
    open: BTreeSet<(i64, String)>,
    exhausted: BTreeSet<(i64, String)>,
    observed_now: i64,
}

impl GateState {
    fn order(&mut self, exhausted: bool) -> &mut BTreeSet<(i64, String)> {
        if exhausted {
            &mut self.exhausted
        } else {
            &mut self.open
        }
    }

    fn observe(&mut self, now: i64) {
        self.observed_now = self.observed_now.max(now);
    }

    fn remove(&mut self, identifier: &str, max_requests: u32) -> Option<GateEntry> {
        let entry = self.entries.remove(identifier)?;
        self.order(entry.count >= max_requests)
            .remove(&(entry.reset_time, identifier.to_string()));
        Some(entry)
    }

    /// Identifier of the next entry to evict, per the module-level policy.
    fn victim(&self) -> Option<String> {
        let expired = [self.open.first(), self.exhausted.first()]
            .into_iter()
            .flatten()
            .filter(|(reset_time, _)| *reset_time <= self.observed_now)
            .min();

        expired
            .or_else(|| self.open.first())
            .or_else(|| self.exhausted.first())
            .map(|(_, identifier)| identifier.clone())
    }
}

/// Bounded, best-effort mirror of window counters.
#[derive(Debug)]
pub struct InMemoryGate {
    max_requests: u32,
    capacity: usize,
    state: Mutex<GateState>,
}

impl InMemoryGate {
    pub fn new(max_requests: u32, capacity: usize) -> Self {
        Self {
            max_requests,
            capacity: capacity.max(1),
            state: Mutex::new(GateState::default()),
        }
    }

    /// Returns `false` only when a cached window is still running and full.
    pub fn check(&self, identifier: &str, now: i64) -> bool {
        self.blocked_until(identifier, now).is_none()
    }

    /// End of the cached window if the identifier is known to be exhausted.
    pub fn blocked_until(&self, identifier: &str, now: i64) -> Option<i64> {
        let mut state = self.state.lock();
        state.observe(now);
        state
            .entries
            .get(identifier)
            .filter(|entry| now < entry.reset_time && entry.count >= self.max_requests)
            .map(|entry| entry.reset_time)
    }

    /// Cache the state a transaction resolved to.
    pub fn record(&self, identifier: &str, count: u32, reset_time: i64) {
        self.upsert(identifier, GateEntry { count, reset_time });
    }

    /// Mark an identifier exhausted until `reset_time`.
    pub fn block(&self, identifier: &str, reset_time: i64) {
        self.upsert(
            identifier,
            GateEntry {
                count: self.max_requests,
                reset_time,
            },
        );
    }

    pub fn remove(&self, identifier: &str) {
        self.state.lock().remove(identifier, self.max_requests);
    }

    /// Wipe every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.open.clear();
        state.exhausted.clear();
    }

    /// Drop entries whose window ended at or before `now`. Returns how many.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut state = self.state.lock();
        state.observe(now);

        let mut purged = 0;
        for exhausted in [false, true] {
            while let Some((reset_time, identifier)) = state.order(exhausted).first().cloned() {
                if reset_time > now {
                    break;
                }
                state.order(exhausted).pop_first();
                state.entries.remove(&identifier);
                purged += 1;
            }
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    fn upsert(&self, identifier: &str, entry: GateEntry) {
        let mut state = self.state.lock();
        let replaced = state.remove(identifier, self.max_requests).is_some();

        if !replaced && state.entries.len() >= self.capacity {
            if let Some(victim) = state.victim() {
                state.remove(&victim, self.max_requests);
                trace!(identifier = %victim, "Gate at capacity, evicted entry");
            }
        }

        state
            .order(entry.count >= self.max_requests)
            .insert((entry.reset_time, identifier.to_string()));
        state.entries.insert(identifier.to_string(), entry);
    }

    #[cfg(test)]
    fn indexed(&self) -> usize {
        let state = self.state.lock();
        state.open.len() + state.exhausted.len()
    }
}
