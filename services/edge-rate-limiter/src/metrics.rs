// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the rate limiter.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// How a single `check_rate_limit` call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionOutcome {
    /// Admitted by a store transaction
    Allowed,
    /// Denied by a store transaction
    Denied,
    /// Denied by the in-memory gate without touching the store
    ShortCircuit,
    /// Admitted because the store failed or timed out
    FailOpen,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::ShortCircuit => "short_circuit",
            Self::FailOpen => "fail_open",
        }
    }
}

/// Metric handles registered in a dedicated registry.
pub struct LimiterMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    swept: IntCounter,
    store_latency: Histogram,
}

impl LimiterMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new("ratelimit_decisions_total", "Rate limit decisions by outcome"),
            &["outcome"],
        )?;
        let swept = IntCounter::new(
            "ratelimit_swept_records_total",
            "Expired window records deleted by the sweep",
        )?;
        let store_latency = Histogram::with_opts(HistogramOpts::new(
            "ratelimit_store_transaction_seconds",
            "Latency of window store transactions",
        ))?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(swept.clone()))?;
        registry.register(Box::new(store_latency.clone()))?;

        Ok(Self {
            registry,
            decisions,
            swept,
            store_latency,
        })
    }

    pub fn observe_decision(&self, outcome: DecisionOutcome) {
        self.decisions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn decision_count(&self, outcome: DecisionOutcome) -> u64 {
        self.decisions.with_label_values(&[outcome.as_str()]).get()
    }

    pub fn add_swept(&self, removed: usize) {
        self.swept.inc_by(removed as u64);
    }

    pub fn swept_count(&self) -> u64 {
        self.swept.get()
    }

    pub fn observe_store_latency(&self, elapsed: Duration) {
        self.store_latency.observe(elapsed.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
