//! # Store Traits
//!
//! What the closing engine needs from the outside world, and nothing more.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ClosingEngine<B>                                │
//! │                                                                         │
//! │   B: ClosingBackend = OrderSource + ProductStore                       │
//! │                       + ClosingStore + AuditSink                        │
//! │                                                                         │
//! │   ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │   │ OrderSource  │ │ ProductStore │ │ ClosingStore │ │  AuditSink   │  │
//! │   │ read only    │ │ relative     │ │ create-if-   │ │ append only  │  │
//! │   │              │ │              │ │ absent       │ │              │  │
//! │   └──────────────┘ └──────────────┘ └──────────────┘ └──────────────┘  │
//! │            ▲                ▲               ▲                ▲          │
//! │            └────────────────┴───────┬───────┴────────────────┘          │
//! │                        MemoryStore / SqliteStore                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{BatchWriteError, StoreResult};
use cierre_core::{AuditLogEntry, CourierClosing, DailyClosing, DateKey, Order, Product};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One signed stock change computed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: String,
    pub product_name: String,
    /// Negative for a closing, positive for a reversal.
    pub delta: i64,
}

impl StockAdjustment {
    /// Stock level after this adjustment. Never below zero.
    pub fn apply_to(&self, stock: i64) -> i64 {
        stock.saturating_add(self.delta).max(0)
    }
}

/// Read access to orders. Ranges are half-open `[start, end)`.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Delivered orders dated in the range.
    async fn orders_delivered_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>>;

    /// Orders whose first assignee is `courier`, delivered or not.
    async fn orders_assigned_to(
        &self,
        courier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>>;
}

/// The shared product catalog.
///
/// Stock only moves by relative adjustments, applied by the store against the
/// current level. Two closings adjusting the same product both count.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn all_products(&self) -> StoreResult<Vec<Product>>;

    /// Applies one adjustment atomically, flooring the result at zero.
    async fn adjust_stock(&self, adjustment: &StockAdjustment) -> StoreResult<()>;

    /// Applies a batch of adjustments and returns how many landed.
    ///
    /// The default applies them one by one, so a failure may leave a prefix
    /// of the batch applied. Stores with transactions should override it.
    async fn adjust_stocks(
        &self,
        adjustments: &[StockAdjustment],
    ) -> Result<usize, BatchWriteError> {
        let mut landed = 0;
        for adjustment in adjustments {
            if let Err(source) = self.adjust_stock(adjustment).await {
                return Err(BatchWriteError {
                    landed,
                    failed_product: Some(adjustment.product_name.clone()),
                    source,
                });
            }
            landed += 1;
        }
        Ok(landed)
    }
}

/// Daily and per-courier closing records.
///
/// `create_*_if_absent` must be atomic on the record key: exactly one of two
/// concurrent callers gets `true`.
#[async_trait]
pub trait ClosingStore: Send + Sync {
    async fn get_closing(&self, date_key: DateKey) -> StoreResult<Option<DailyClosing>>;

    async fn create_closing_if_absent(&self, closing: &DailyClosing) -> StoreResult<bool>;

    /// Returns whether a record was deleted.
    async fn delete_closing(&self, date_key: DateKey) -> StoreResult<bool>;

    /// Closings with `from <= date_key <= to`, oldest first.
    async fn list_closings(&self, from: DateKey, to: DateKey) -> StoreResult<Vec<DailyClosing>>;

    async fn get_courier_closing(
        &self,
        courier: &str,
        date_key: DateKey,
    ) -> StoreResult<Option<CourierClosing>>;

    async fn create_courier_closing_if_absent(&self, closing: &CourierClosing)
        -> StoreResult<bool>;

    async fn delete_courier_closing(&self, courier: &str, date_key: DateKey) -> StoreResult<bool>;

    /// Every courier closing of a day.
    async fn courier_closings_for(&self, date_key: DateKey) -> StoreResult<Vec<CourierClosing>>;
}

/// Append-only reversal log: no update, no delete.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_entry(&self, entry: &AuditLogEntry) -> StoreResult<()>;

    /// Entries for one day, oldest first.
    async fn entries_for(&self, date_key: DateKey) -> StoreResult<Vec<AuditLogEntry>>;
}

/// Everything the engine talks to, in one bound.
pub trait ClosingBackend: OrderSource + ProductStore + ClosingStore + AuditSink {}

impl<T> ClosingBackend for T where T: OrderSource + ProductStore + ClosingStore + AuditSink {}
