// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Edge Rate Limiter
//!
//! This crate provides per-identifier fixed-window rate limiting for
//! sensitive endpoints served by stateless, horizontally scaled handlers:
//!
//! - A shared window store (in-memory or Redis) that alone decides admission
//! - A bounded process-local gate that rejects exhausted identifiers for free
//! - Fail-open behaviour when the store errors or times out
//! - Batched maintenance sweep of expired records
//! - Administrative reset and stats operations

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod record;
pub mod store;
pub mod sweep;
pub mod validator;

pub use config::Config;
pub use error::StoreError;
pub use limiter::{Decision, RateLimiter};
pub use record::{RateLimitStats, WindowRecord};
pub use store::{MemoryWindowStore, RedisWindowStore, WindowStore};
pub use validator::{IdentifierValidator, ValidationResult};
