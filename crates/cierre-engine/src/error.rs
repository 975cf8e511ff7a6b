//! # Engine Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Closing Error Categories                         │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Lifecycle     │  │     Gating      │  │     Stock Ledger        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  AlreadyClosed  │  │ CouriersPending │  │ PartialStockApplyFailure│ │
//! │  │  NotClosed      │  │ EmptySummary    │  │ (manual audit needed)   │ │
//! │  │  NotFound       │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │   Validation    │  │   Store (nothing was written)               │  │
//! │  │  (cierre-core)  │  │   Database(DbError) / Unavailable / ...     │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use cierre_core::{CoreError, DateKey, PendingCourier, ProductQuantities, ValidationError};
use cierre_db::DbError;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for caller-facing closing operations.
pub type ClosingResult<T> = Result<T, ClosingError>;

/// A collaborator (order source, product store, closing store, audit sink) failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The store could not serve the request (e.g. an injected test failure).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// A batch of stock writes stopped early.
///
/// `landed` writes of the batch are persisted; the rest are not.
#[derive(Debug, Error)]
#[error("stock batch failed after {landed} writes: {source}")]
pub struct BatchWriteError {
    pub landed: usize,
    /// Name of the product whose write failed, when known.
    pub failed_product: Option<String>,
    #[source]
    pub source: StoreError,
}

/// Caller-facing closing failure. Every variant is reported, none is swallowed.
#[derive(Debug, Error)]
pub enum ClosingError {
    #[error("{date_key}{} is already closed", courier_suffix(.courier))]
    AlreadyClosed {
        date_key: DateKey,
        courier: Option<String>,
    },

    #[error("{date_key} has no daily closing to revert")]
    NotClosed { date_key: DateKey },

    #[error("No closing for courier {courier} on {date_key}")]
    NotFound { courier: String, date_key: DateKey },

    #[error("Couriers still pending: {}", describe_pending(.0))]
    CouriersPending(Vec<PendingCourier>),

    #[error("No products could be extracted from the delivered orders of {date_key}")]
    EmptySummary { date_key: DateKey },

    /// Some stock writes landed before `failed_product` failed. No closing
    /// record was written; stock needs a manual audit.
    #[error("Stock only partially applied ({} products) before '{failed_product}' failed: {reason}", .applied.len())]
    PartialStockApplyFailure {
        applied: ProductQuantities,
        failed_product: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A store call failed. Stock this call had already moved was compensated.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ClosingError {
    /// True when stock and closing records may disagree.
    pub fn requires_manual_audit(&self) -> bool {
        matches!(self, ClosingError::PartialStockApplyFailure { .. })
    }
}

impl From<CoreError> for ClosingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ClosingError::Validation(e),
            other => ClosingError::Validation(ValidationError::InvalidFormat {
                field: "input".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}

impl From<DbError> for ClosingError {
    fn from(err: DbError) -> Self {
        ClosingError::Store(StoreError::Database(err))
    }
}

fn courier_suffix(courier: &Option<String>) -> String {
    courier
        .as_deref()
        .map(|c| format!(" for courier {}", c))
        .unwrap_or_default()
}

fn describe_pending(pending: &[PendingCourier]) -> String {
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DateKey {
        DateKey::parse("2024-06-01").unwrap()
    }

    #[test]
    fn test_already_closed_message() {
        let day = ClosingError::AlreadyClosed {
            date_key: key(),
            courier: None,
        };
        assert_eq!(day.to_string(), "2024-06-01 is already closed");

        let courier = ClosingError::AlreadyClosed {
            date_key: key(),
            courier: Some("r1@mail.com".into()),
        };
        assert_eq!(
            courier.to_string(),
            "2024-06-01 for courier r1@mail.com is already closed"
        );
    }

    #[test]
    fn test_pending_lists_every_courier() {
        let err = ClosingError::CouriersPending(vec![
            PendingCourier {
                courier: "r1".into(),
                delivered: 3,
            },
            PendingCourier {
                courier: "r2".into(),
                delivered: 1,
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("r1"));
        assert!(message.contains("r2"));
    }

    #[test]
    fn test_only_partial_failure_needs_audit() {
        let partial = ClosingError::PartialStockApplyFailure {
            applied: [("Paint A".to_string(), 2)].into(),
            failed_product: "Paint B".into(),
            reason: "disk full".into(),
        };
        assert!(partial.requires_manual_audit());
        assert!(!ClosingError::NotClosed { date_key: key() }.requires_manual_audit());
    }

    #[test]
    fn test_core_errors_become_validation() {
        let err: ClosingError = CoreError::InvalidUtcOffset { minutes: 5000 }.into();
        assert!(matches!(err, ClosingError::Validation(_)));
    }
}
