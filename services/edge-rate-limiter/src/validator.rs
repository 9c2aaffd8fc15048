// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Identifier validation for the HTTP surface.
//!
//! The limiter treats any identifier as an opaque key. Requests arriving over
//! HTTP are screened here first:
//! - Blank identifiers are rejected
//! - Identifiers longer than the configured bound are rejected
//! - Control characters are rejected

use crate::config::ValidationConfig;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier must not be blank")]
    Blank,

    #[error("Identifier is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("Identifier contains a control character at byte {0}")]
    ControlCharacter(usize),
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Identifier is usable as a bucket key
    Valid,
    /// Identifier is rejected
    Invalid(IdentifierError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&IdentifierError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }
}

/// Identifier validator.
pub struct IdentifierValidator {
    config: ValidationConfig,
}

impl IdentifierValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a caller-supplied identifier.
    pub fn validate(&self, identifier: &str) -> ValidationResult {
        if identifier.trim().is_empty() {
            debug!("Blank identifier");
            return ValidationResult::Invalid(IdentifierError::Blank);
        }

        let max = self.config.max_identifier_len;
        if identifier.len() > max {
            debug!(len = identifier.len(), max, "Identifier too long");
            return ValidationResult::Invalid(IdentifierError::TooLong {
                len: identifier.len(),
                max,
            });
        }

        if let Some((at, _)) = identifier.char_indices().find(|(_, c)| c.is_control()) {
            debug!(at, "Identifier contains control character");
            return ValidationResult::Invalid(IdentifierError::ControlCharacter(at));
        }

        ValidationResult::Valid
    }
}
