// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Edge Rate Limiter Service
//!
//! A per-identifier fixed-window rate limiter for sensitive endpoints
//! (authentication, uploads, webhooks) behind stateless handlers.
//!
//! ## Usage
//!
//! A reverse proxy or application handler calls `POST /check` with the
//! caller's identifier (`ip:<addr>`, `user:<id>`, ...) and serves the request
//! only when `allowed` is true. Operators use `GET /limits/:identifier` and
//! `DELETE /limits/:identifier` to inspect and clear a quota.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT_WINDOW_MS`: Window length in milliseconds (default: 60000)
//! - `RATE_LIMIT_MAX_REQUESTS`: Requests per identifier per window (default: 10)
//! - `STORE_TIMEOUT_MS`: Store transaction bound before failing open (default: 2000)
//! - `GATE_CAPACITY`: Identifiers held in the in-memory gate (default: 10000)
//! - `STORE_BACKEND`: `memory` or `redis` (default: memory)
//! - `REDIS_URL`: Redis connection URL (default: redis://127.0.0.1:6379)
//! - `REDIS_KEY_PREFIX`: Prefix for Redis keys (default: ratelimit)
//! - `REDIS_MAX_RETRIES`: Optimistic transaction attempts (default: 16)
//! - `SWEEP_INTERVAL_SECS`: Seconds between maintenance sweeps (default: 300)
//! - `SWEEP_BATCH_SIZE`: Records deleted per sweep batch (default: 500)
//! - `MAX_IDENTIFIER_LEN`: Longest accepted identifier (default: 256)

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use edge_rate_limiter::{
    config::{Config, StoreBackend},
    handlers::{router, AppState},
    limiter::RateLimiter,
    metrics::LimiterMetrics,
    store::{MemoryWindowStore, RedisWindowStore, WindowStore},
    sweep::spawn_sweeper,
    validator::IdentifierValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        window_ms = config.rate_limit.window_millis(),
        max_requests = config.rate_limit.max_requests,
        store_timeout_ms = config.rate_limit.store_timeout_ms,
        backend = ?config.store.backend,
        "Starting edge rate limiter"
    );

    let store = build_store(&config).await;
    let metrics = Arc::new(LimiterMetrics::new()?);
    let limiter = Arc::new(
        RateLimiter::new(config.rate_limit.clone(), store)
            .with_metrics(metrics.clone())
            .with_sweep_batch_size(config.sweep.batch_size),
    );

    // Spawn maintenance sweep
    let _sweeper = spawn_sweeper(limiter.clone(), config.sweep.interval());

    let state = Arc::new(AppState {
        limiter,
        validator: IdentifierValidator::new(config.validation.clone()),
        metrics,
    });
    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Connect the configured store, falling back to memory if Redis is down.
async fn build_store(config: &Config) -> Arc<dyn WindowStore> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory window store; limits are not shared across instances");
            Arc::new(MemoryWindowStore::new())
        }
        StoreBackend::Redis => {
            match RedisWindowStore::connect(
                &config.store.redis_url,
                &config.store.key_prefix,
                config.store.max_retries,
            )
            .await
            {
                Ok(store) => {
                    info!(key_prefix = %config.store.key_prefix, "Connected to Redis window store");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Failed to connect to Redis, falling back to in-memory window store"
                    );
                    Arc::new(MemoryWindowStore::new())
                }
            }
        }
    }
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let defaults = Config::default();
    Config {
        bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        rate_limit: edge_rate_limiter::config::RateLimitConfig {
            window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.rate_limit.window_ms),
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit.max_requests),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.rate_limit.store_timeout_ms),
            gate_capacity: env_or("GATE_CAPACITY", defaults.rate_limit.gate_capacity),
        },
        store: edge_rate_limiter::config::StoreConfig {
            backend: std::env::var("STORE_BACKEND")
                .ok()
                .and_then(|v| StoreBackend::from_str(&v).ok())
                .unwrap_or(defaults.store.backend),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.store.redis_url),
            key_prefix: std::env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.store.key_prefix),
            max_retries: env_or("REDIS_MAX_RETRIES", defaults.store.max_retries),
        },
        sweep: edge_rate_limiter::config::SweepConfig {
            interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep.interval_secs),
            batch_size: env_or("SWEEP_BATCH_SIZE", defaults.sweep.batch_size),
        },
        validation: edge_rate_limiter::config::ValidationConfig {
            max_identifier_len: env_or(
                "MAX_IDENTIFIER_LEN",
                defaults.validation.max_identifier_len,
            ),
        },
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
