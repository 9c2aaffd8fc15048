// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the window record store.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`WindowStore`](crate::store::WindowStore) backend.
///
/// None of these ever reach a caller of `check_rate_limit`; the coordinator
/// logs them and fails open.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transaction for {identifier} still conflicting after {attempts} attempts")]
    Conflict { identifier: String, attempts: u32 },

    #[error("Corrupt window record for {identifier}: {reason}")]
    CorruptRecord { identifier: String, reason: String },

    #[error("Cannot apply {mutation} to a missing record for {identifier}")]
    MissingRecord {
        identifier: String,
        mutation: &'static str,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
