//! # Error Types
//!
//! Domain-specific error types for cierre-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cierre-core errors (this file)                                        │
//! │  ├── CoreError        - Parsing and domain errors                      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cierre-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  cierre-engine errors                                                  │
//! │  ├── StoreError       - Collaborator (store) failures                  │
//! │  └── ClosingError     - What callers of close/revert see               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClosingError → CliError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A date key is not a `yyyy-mm-dd` calendar date.
    #[error("Invalid date key '{value}': expected yyyy-mm-dd")]
    InvalidDateKey { value: String },

    /// A UTC offset that chrono cannot represent (beyond ±24h).
    #[error("Invalid UTC offset: {minutes} minutes")]
    InvalidUtcOffset { minutes: i32 },

    /// Payment method string not in {efectivo, transferencia, tarjeta, none}.
    #[error("Unknown payment method: '{0}'")]
    UnknownPaymentMethod(String),

    /// Decrement policy string not in {global_pass, courier_pass}.
    #[error("Unknown decrement policy: '{0}'")]
    UnknownDecrementPolicy(String),

    /// Month outside 1..=12 in a report request.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any store is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is outside the valid range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid email, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
