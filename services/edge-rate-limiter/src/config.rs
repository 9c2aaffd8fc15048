// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the edge rate limiter.
//!
//! Window length and quota are fixed at deployment; every identifier shares
//! the same pair.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest window the limiter will apply (30 days).
pub const MAX_WINDOW_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Configuration for the rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Window record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Maintenance sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Identifier validation for the HTTP surface
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Fixed-window quota applied to every identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests admitted per identifier per window (default: 10)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Upper bound on one store transaction before failing open (default: 2000)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Identifiers mirrored in the in-memory gate (default: 10000)
    #[serde(default = "default_gate_capacity")]
    pub gate_capacity: usize,
}

/// Which window record store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; only correct for a single instance
    Memory,
    /// Shared Redis; correct across instances
    Redis,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Window record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend (default: memory)
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Redis connection URL (default: redis://127.0.0.1:6379)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for every Redis key (default: ratelimit)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Optimistic transaction attempts before giving up (default: 16)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Maintenance sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweeps (default: 300)
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Records deleted per store call (default: 500)
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: usize,
}

/// Identifier validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Longest accepted identifier in bytes (default: 256)
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: usize,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    10
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_gate_capacity() -> usize {
    10_000
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

fn default_max_retries() -> u32 {
    16
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_sweep_batch_size() -> usize {
    500
}

fn default_max_identifier_len() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            sweep: SweepConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            store_timeout_ms: default_store_timeout_ms(),
            gate_capacity: default_gate_capacity(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            batch_size: default_sweep_batch_size(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: default_max_identifier_len(),
        }
    }
}

impl RateLimitConfig {
    /// Window length actually applied, clamped to `1..=MAX_WINDOW_MS`.
    pub fn window_millis(&self) -> i64 {
        self.window_ms.clamp(1, MAX_WINDOW_MS) as i64
    }

    /// Get the store transaction timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl SweepConfig {
    /// Get the sweep interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
