//! # CLI Error Type
//!
//! Every failure leaves the binary as one JSON object on stderr:
//! ```json
//! {
//!   "code": "COURIERS_PENDING",
//!   "message": "Couriers still pending: r1@mail.com (3 delivered)"
//! }
//! ```
//! The exit code follows the error code, so scripts can branch without
//! parsing the message.

use serde::Serialize;

use cierre_core::{CoreError, ValidationError};
use cierre_db::DbError;
use cierre_engine::{ClosingError, ConfigError, StoreError};

/// Error printed by the CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyClosed,
    NotClosed,
    NotFound,
    CouriersPending,
    EmptySummary,
    /// Stock and closing records may disagree; needs a manual audit.
    PartialStockApply,
    ValidationError,
    ConfigError,
    DatabaseError,
    Internal,
}

impl ErrorCode {
    /// Process exit code.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCode::ValidationError | ErrorCode::ConfigError => 2,
            ErrorCode::AlreadyClosed
            | ErrorCode::NotClosed
            | ErrorCode::NotFound
            | ErrorCode::CouriersPending
            | ErrorCode::EmptySummary => 3,
            ErrorCode::PartialStockApply => 4,
            ErrorCode::DatabaseError | ErrorCode::Internal => 1,
        }
    }
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl From<ClosingError> for CliError {
    fn from(err: ClosingError) -> Self {
        let code = match &err {
            ClosingError::AlreadyClosed { .. } => ErrorCode::AlreadyClosed,
            ClosingError::NotClosed { .. } => ErrorCode::NotClosed,
            ClosingError::NotFound { .. } => ErrorCode::NotFound,
            ClosingError::CouriersPending(_) => ErrorCode::CouriersPending,
            ClosingError::EmptySummary { .. } => ErrorCode::EmptySummary,
            ClosingError::PartialStockApplyFailure { .. } => {
                tracing::error!("{}", err);
                ErrorCode::PartialStockApply
            }
            ClosingError::Validation(_) => ErrorCode::ValidationError,
            ClosingError::Store(StoreError::Database(DbError::NotFound { .. })) => {
                ErrorCode::NotFound
            }
            ClosingError::Store(_) => ErrorCode::DatabaseError,
        };
        CliError::new(code, err.to_string())
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                CliError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            DbError::ConnectionFailed(_) => {
                CliError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            other => CliError::new(ErrorCode::DatabaseError, other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::validation(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("Failed to serialize output: {}", err))
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::internal(err.to_string())
    }
}
