//! # Closing Engine
//!
//! The caller-facing API of the daily closing.
//!
//! ## State Machine (per business day)
//! ```text
//!                 close_courier            close_courier (last one)
//!   ┌──────┐ ───────────────► ┌────────────────┐ ──────────► ┌─────────────────┐
//!   │ Open │                  │ CourierPartial │             │ CourierComplete │
//!   └──────┘                  └────────────────┘             └────────┬────────┘
//!      ▲                                                              │ close_day
//!      │ close_day (no courier had deliveries)                        ▼
//!      │                      ┌──────────┐   revert_day   ┌────────────────────┐
//!      └──────────────────────│ Reversed │ ◄───────────── │       Closed       │
//!                close_day    └──────────┘                └────────────────────┘
//! ```
//!
//! ## Guarantees
//! - A day closes at most once: `create_closing_if_absent` is the arbiter, and
//!   in-process calls on the same day are serialised by a per-day lock.
//! - Stock batches of every day go through one catalog lock, and stores apply
//!   them as relative adjustments.
//! - A closing record is written only after its stock batch fully landed.
//! - Reversals add back exactly the stored `stock_applied`, and the audit
//!   entry is appended before the record is removed.

use chrono::{Datelike, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{ClosingError, ClosingResult};
use crate::ledger::{self, Direction};
use crate::store::{AuditSink, ClosingBackend, ClosingStore, OrderSource, ProductStore};
use cierre_core::aggregate::aggregate;
use cierre_core::closing::{couriers_with_deliveries, derive_state, pending_couriers, uncovered_orders};
use cierre_core::report::{self, MonthlySummary};
use cierre_core::validation::{validate_admin, validate_courier, validate_expense};
use cierre_core::{
    AuditLogEntry, ClosingScope, CourierClosing, CourierSettlement, DailyClosing, DateKey,
    DayStatus, Money, Order, Product, ProductQuantities, ValidationError,
};

/// One async mutex per business day.
#[derive(Debug, Default)]
struct DayLocks {
    locks: Mutex<HashMap<DateKey, Arc<Mutex<()>>>>,
}

impl DayLocks {
    async fn acquire(&self, date_key: DateKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(date_key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Runs closings and reversals against a [`ClosingBackend`].
pub struct ClosingEngine<B> {
    backend: Arc<B>,
    config: EngineConfig,
    locks: DayLocks,
    /// Held for every stock batch. The catalog is shared by all days.
    catalog: Mutex<()>,
}

impl<B: ClosingBackend> ClosingEngine<B> {
    pub fn new(backend: Arc<B>, config: EngineConfig) -> Self {
        info!(
            policy = %config.decrement_policy,
            surcharge_bps = config.surcharge_bps,
            utc_offset = config.business_utc_offset_minutes,
            "Closing engine ready"
        );
        ClosingEngine {
            backend,
            config,
            locks: DayLocks::default(),
            catalog: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    // =========================================================================
    // Closings
    // =========================================================================

    /// Closes the whole business day.
    ///
    /// ## Steps
    /// 1. Reject if the day already has a closing
    /// 2. Reject while any courier with deliveries has no courier closing
    /// 3. Aggregate every delivered order; reject an empty summary
    /// 4. Decrement stock per the decrement policy
    /// 5. Persist the closing (create-if-absent)
    pub async fn close_day(&self, date_key: DateKey) -> ClosingResult<DailyClosing> {
        let _guard = self.locks.acquire(date_key).await;

        if self.backend.get_closing(date_key).await?.is_some() {
            warn!(%date_key, "Day already closed");
            return Err(ClosingError::AlreadyClosed {
                date_key,
                courier: None,
            });
        }

        let orders = self.delivered_orders(date_key).await?;
        let closed = self.closed_couriers(date_key).await?;

        let pending = pending_couriers(&couriers_with_deliveries(&orders), &closed);
        if !pending.is_empty() {
            warn!(%date_key, pending = pending.len(), "Day close blocked by pending couriers");
            return Err(ClosingError::CouriersPending(pending));
        }

        let summary = aggregate(&orders);
        if summary.is_empty() {
            warn!(%date_key, orders = orders.len(), "Nothing to close");
            return Err(ClosingError::EmptySummary { date_key });
        }

        let to_decrement = if self.config.decrement_policy.courier_close_decrements() {
            let settled = self.settled_orders(date_key).await?;
            aggregate(uncovered_orders(&orders, &settled)).products
        } else {
            summary.products.clone()
        };
        debug!(%date_key, products = to_decrement.len(), "Decrementing day stock");
        let stock_applied = self.apply_stock(&to_decrement, Direction::Decrement).await?;

        let closing = DailyClosing {
            date_key,
            products_sold: summary.products,
            per_courier: summary.per_courier,
            stock_applied,
            created_at: Utc::now(),
        };

        match self.backend.create_closing_if_absent(&closing).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(%date_key, "Lost the race to close the day, compensating stock");
                self.compensate(&closing.stock_applied, Direction::Decrement).await;
                return Err(ClosingError::AlreadyClosed {
                    date_key,
                    courier: None,
                });
            }
            Err(err) => {
                error!(%date_key, error = %err, "Failed to persist closing, compensating stock");
                self.compensate(&closing.stock_applied, Direction::Decrement).await;
                return Err(err.into());
            }
        }

        info!(
            %date_key,
            orders = closing.delivered_orders(),
            units = closing.total_units(),
            "Day closed"
        );
        Ok(closing)
    }

    /// Closes one courier's share of the day. Re-closing is rejected, not merged.
    pub async fn close_courier(
        &self,
        courier: &str,
        date_key: DateKey,
    ) -> ClosingResult<CourierClosing> {
        let courier = validate_courier(courier)?;
        let _guard = self.locks.acquire(date_key).await;

        let already_closed = || ClosingError::AlreadyClosed {
            date_key,
            courier: Some(courier.clone()),
        };

        if self.backend.get_closing(date_key).await?.is_some() {
            warn!(%date_key, %courier, "Courier close after the day closed");
            return Err(already_closed());
        }
        if self
            .backend
            .get_courier_closing(&courier, date_key)
            .await?
            .is_some()
        {
            warn!(%date_key, %courier, "Courier already closed");
            return Err(already_closed());
        }

        let orders = self.courier_orders(&courier, date_key).await?;
        let delivered: Vec<&Order> = orders.iter().filter(|o| o.delivered).collect();
        let summary = aggregate(delivered.iter().copied());

        let stock_applied = if self.config.decrement_policy.courier_close_decrements() {
            self.apply_stock(&summary.products, Direction::Decrement).await?
        } else {
            ProductQuantities::new()
        };

        let closing = CourierClosing {
            courier_id: courier.clone(),
            date_key,
            products_sold: summary.products,
            delivered_orders: u32::try_from(delivered.len()).unwrap_or(u32::MAX),
            order_ids: delivered.iter().map(|o| o.id.clone()).collect(),
            stock_applied,
            created_at: Utc::now(),
        };

        match self.backend.create_courier_closing_if_absent(&closing).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(%date_key, %courier, "Lost the race to close courier, compensating stock");
                self.compensate(&closing.stock_applied, Direction::Decrement).await;
                return Err(already_closed());
            }
            Err(err) => {
                error!(%date_key, %courier, error = %err, "Failed to persist courier closing");
                self.compensate(&closing.stock_applied, Direction::Decrement).await;
                return Err(err.into());
            }
        }

        info!(
            %date_key,
            %courier,
            orders = closing.delivered_orders,
            stock_products = closing.stock_applied.len(),
            "Courier closed"
        );
        Ok(closing)
    }

    // =========================================================================
    // Reversals
    // =========================================================================

    /// Reverts the day's closing: stock back, audit entry appended, record
    /// deleted. If the entry can't be appended the stock is taken back and
    /// the closing stays, so the reversal can be retried.
    ///
    /// Courier closings of the day are left alone.
    pub async fn revert_day(&self, date_key: DateKey, acting_admin: &str) -> ClosingResult<()> {
        let admin = validate_admin(acting_admin)?;
        let _guard = self.locks.acquire(date_key).await;

        let closing = self
            .backend
            .get_closing(date_key)
            .await?
            .ok_or(ClosingError::NotClosed { date_key })?;

        let restored = self
            .apply_stock(&closing.stock_applied, Direction::Increment)
            .await?;

        let entry = AuditLogEntry::global(date_key, admin, restored, Utc::now());
        if let Err(err) = self.backend.append_entry(&entry).await {
            error!(%date_key, error = %err, "Failed to append reversal entry, compensating stock");
            self.compensate(&entry.reverted_quantities, Direction::Increment).await;
            return Err(err.into());
        }

        match self.backend.delete_closing(date_key).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(%date_key, "Closing vanished during reversal, compensating stock");
                self.compensate(&entry.reverted_quantities, Direction::Increment).await;
                return Err(ClosingError::NotClosed { date_key });
            }
            Err(err) => {
                error!(%date_key, error = %err, "Failed to delete closing, compensating stock");
                self.compensate(&entry.reverted_quantities, Direction::Increment).await;
                return Err(err.into());
            }
        }

        info!(
            %date_key,
            admin = %entry.acting_admin,
            products = entry.reverted_quantities.len(),
            "Day closing reverted"
        );
        Ok(())
    }

    /// Reverts one courier closing.
    pub async fn revert_courier(
        &self,
        courier: &str,
        date_key: DateKey,
        acting_admin: &str,
    ) -> ClosingResult<()> {
        let courier = validate_courier(courier)?;
        let admin = validate_admin(acting_admin)?;
        let _guard = self.locks.acquire(date_key).await;

        let not_found = || ClosingError::NotFound {
            courier: courier.clone(),
            date_key,
        };

        let closing = self
            .backend
            .get_courier_closing(&courier, date_key)
            .await?
            .ok_or_else(not_found)?;

        let restored = self
            .apply_stock(&closing.stock_applied, Direction::Increment)
            .await?;

        let entry = AuditLogEntry::courier(date_key, admin, courier.clone(), restored, Utc::now());
        if let Err(err) = self.backend.append_entry(&entry).await {
            error!(%date_key, %courier, error = %err, "Failed to append reversal entry");
            self.compensate(&entry.reverted_quantities, Direction::Increment).await;
            return Err(err.into());
        }

        match self.backend.delete_courier_closing(&courier, date_key).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(%date_key, %courier, "Courier closing vanished during reversal");
                self.compensate(&entry.reverted_quantities, Direction::Increment).await;
                return Err(not_found());
            }
            Err(err) => {
                error!(%date_key, %courier, error = %err, "Failed to delete courier closing");
                self.compensate(&entry.reverted_quantities, Direction::Increment).await;
                return Err(err.into());
            }
        }

        info!(
            %date_key,
            %courier,
            admin = %entry.acting_admin,
            "Courier closing reverted"
        );
        Ok(())
    }

    // =========================================================================
    // Read-only views
    // =========================================================================

    /// Where the day stands and what still blocks its closing.
    pub async fn day_status(&self, date_key: DateKey) -> ClosingResult<DayStatus> {
        let orders = self.delivered_orders(date_key).await?;
        let closed = self.closed_couriers(date_key).await?;
        let pending = pending_couriers(&couriers_with_deliveries(&orders), &closed);
        let closing = self.backend.get_closing(date_key).await?;

        let last_reversal = self
            .backend
            .entries_for(date_key)
            .await?
            .into_iter()
            .filter(|e| e.scope == ClosingScope::Global)
            .last();

        let delivered_orders = u32::try_from(orders.len()).unwrap_or(u32::MAX);
        let state = derive_state(
            closing.is_some(),
            last_reversal.is_some(),
            delivered_orders,
            &pending,
            closed.len(),
        );

        Ok(DayStatus {
            date_key,
            state,
            delivered_orders,
            pending_couriers: pending,
            closed_couriers: closed.into_iter().collect(),
            closing,
            last_reversal,
        })
    }

    /// Reversal history of a day, oldest first.
    pub async fn audit_trail(&self, date_key: DateKey) -> ClosingResult<Vec<AuditLogEntry>> {
        Ok(self.backend.entries_for(date_key).await?)
    }

    /// A courier's cash settlement for the day.
    pub async fn courier_settlement(
        &self,
        courier: &str,
        date_key: DateKey,
        extra_expense: Money,
    ) -> ClosingResult<CourierSettlement> {
        let courier = validate_courier(courier)?;
        validate_expense(extra_expense.units())?;

        let orders = self.courier_orders(&courier, date_key).await?;
        Ok(CourierSettlement::from_orders(
            courier,
            date_key,
            &orders,
            extra_expense,
            self.config.surcharge_rate(),
        ))
    }

    /// Statistics over the month's daily closings.
    pub async fn monthly_summary(&self, year: i32, month: u32) -> ClosingResult<MonthlySummary> {
        let (first, last) = month_range(year, month)?;
        let closings = self
            .backend
            .list_closings(DateKey::from_date(first), DateKey::from_date(last))
            .await?;
        Ok(report::monthly_summary(&closings, year, month)?)
    }

    /// Catalog entries at or under their minimum threshold.
    pub async fn low_stock(&self) -> ClosingResult<Vec<Product>> {
        Ok(report::low_stock(&self.backend.all_products().await?))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn delivered_orders(&self, date_key: DateKey) -> ClosingResult<Vec<Order>> {
        let (start, end) = date_key.bounds(self.config.business_utc_offset_minutes)?;
        let mut orders = self.backend.orders_delivered_between(start, end).await?;
        orders.retain(|o| o.delivered);
        debug!(%date_key, orders = orders.len(), "Delivered orders snapshot");
        Ok(orders)
    }

    async fn courier_orders(&self, courier: &str, date_key: DateKey) -> ClosingResult<Vec<Order>> {
        let (start, end) = date_key.bounds(self.config.business_utc_offset_minutes)?;
        let mut orders = self.backend.orders_assigned_to(courier, start, end).await?;
        orders.retain(|o| o.is_assigned_to(courier));
        Ok(orders)
    }

    async fn closed_couriers(&self, date_key: DateKey) -> ClosingResult<BTreeSet<String>> {
        Ok(self
            .backend
            .courier_closings_for(date_key)
            .await?
            .into_iter()
            .map(|c| c.courier_id)
            .collect())
    }

    /// Ids of the orders the day's courier closings settled.
    async fn settled_orders(&self, date_key: DateKey) -> ClosingResult<BTreeSet<String>> {
        Ok(self
            .backend
            .courier_closings_for(date_key)
            .await?
            .into_iter()
            .flat_map(|c| c.order_ids)
            .collect())
    }

    /// One stock batch under the catalog lock.
    async fn apply_stock(
        &self,
        deltas: &ProductQuantities,
        direction: Direction,
    ) -> ClosingResult<ProductQuantities> {
        let _catalog = self.catalog.lock().await;
        ledger::apply(&*self.backend, deltas, direction).await
    }

    /// Undoes a batch this call applied itself. Failures are logged; the
    /// caller's error stands either way.
    async fn compensate(&self, applied: &ProductQuantities, applied_as: Direction) {
        if applied.is_empty() {
            return;
        }
        if let Err(err) = self.apply_stock(applied, applied_as.opposite()).await {
            error!(error = %err, "Stock compensation failed, manual audit required");
        }
    }
}

/// First and last calendar day of a month.
fn month_range(year: i32, month: u32) -> ClosingResult<(NaiveDate, NaiveDate)> {
    let invalid = || ValidationError::OutOfRange {
        field: "month".to_string(),
        min: 1,
        max: 12,
    };

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;

    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};
    use cierre_core::{DayState, DecrementPolicy, LineItem, PaymentMethod};
    use cierre_db::{Database, DbConfig};

    const DAY: &str = "2024-06-01";

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    /// 12:00 local on DAY at UTC-3.
    fn noon() -> chrono::DateTime<Utc> {
        "2024-06-01T15:00:00Z".parse().unwrap()
    }

    fn order(id: &str, courier: Option<&str>, summary: &str) -> Order {
        let mut order = Order::new(id, noon());
        order.delivered = true;
        order.assigned_to = courier.map(|c| vec![c.to_string()]).unwrap_or_default();
        order.summary_text = Some(summary.to_string());
        order
    }

    async fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_product(Product::new("p-a", "Paint A", 1000, 10)).await;
        store.insert_product(Product::new("p-b", "Paint B", 500, 3)).await;
        Arc::new(store)
    }

    fn engine(store: &Arc<MemoryStore>, policy: DecrementPolicy) -> ClosingEngine<MemoryStore> {
        let config = EngineConfig {
            decrement_policy: policy,
            ..EngineConfig::default()
        };
        ClosingEngine::new(store.clone(), config)
    }

    #[tokio::test]
    async fn test_close_day_twice_is_rejected() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let first = engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(8));

        let second = engine.close_day(key(DAY)).await.unwrap_err();
        assert!(matches!(second, ClosingError::AlreadyClosed { courier: None, .. }));
        assert_eq!(store.stock_of("Paint A").await, Some(8));
        assert_eq!(store.get_closing(key(DAY)).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_pending_courier_blocks_day_close() {
        let store = store().await;
        for i in 0..3 {
            store
                .insert_order(order(&format!("o-{i}"), Some("x@mail.com"), "Paint A x1"))
                .await;
        }
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        match engine.close_day(key(DAY)).await.unwrap_err() {
            ClosingError::CouriersPending(pending) => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].courier, "x@mail.com");
                assert_eq!(pending[0].delivered, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.stock_of("Paint A").await, Some(10));
        assert!(store.get_closing(key(DAY)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_summary_is_rejected() {
        let store = store().await;
        store.insert_order(order("o-1", None, "thanks for your purchase")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let err = engine.close_day(key(DAY)).await.unwrap_err();
        assert!(matches!(err, ClosingError::EmptySummary { .. }));
        assert!(store.get_closing(key(DAY)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undelivered_and_other_days_are_ignored() {
        let store = store().await;
        let mut pending = order("o-1", None, "Paint A x5");
        pending.delivered = false;
        store.insert_order(pending).await;
        let mut tomorrow = order("o-2", None, "Paint A x5");
        tomorrow.date = "2024-06-02T15:00:00Z".parse().unwrap();
        store.insert_order(tomorrow).await;
        store.insert_order(order("o-3", None, "Paint A x1")).await;

        let closing = engine(&store, DecrementPolicy::GlobalPass)
            .close_day(key(DAY))
            .await
            .unwrap();
        assert_eq!(closing.products_sold.get("Paint A"), Some(&1));
        assert_eq!(store.stock_of("Paint A").await, Some(9));
    }

    #[tokio::test]
    async fn test_structured_and_text_orders_extract_the_same() {
        let store = store().await;
        let mut structured = order("o-1", None, "");
        structured.summary_text = None;
        structured.line_items = Some(vec![LineItem::new("Paint A", 2, 100)]);
        store.insert_order(structured).await;
        store
            .insert_order(order("o-2", None, "Paint A x2 ($200) | TOTAL: $200"))
            .await;

        let closing = engine(&store, DecrementPolicy::GlobalPass)
            .close_day(key(DAY))
            .await
            .unwrap();
        assert_eq!(closing.products_sold.get("Paint A"), Some(&4));
    }

    #[tokio::test]
    async fn test_floor_and_exact_reversal() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x4 - Paint B x5")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(6));
        assert_eq!(store.stock_of("Paint B").await, Some(0));

        engine.revert_day(key(DAY), "admin@mail.com").await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(10));
        assert_eq!(store.stock_of("Paint B").await, Some(5));

        let trail = engine.audit_trail(key(DAY)).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].scope, ClosingScope::Global);
        assert_eq!(trail[0].acting_admin, "admin@mail.com");
        assert_eq!(trail[0].reverted_quantities.get("Paint B"), Some(&5));
    }

    #[tokio::test]
    async fn test_unknown_products_are_skipped_by_the_ledger() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x1 - Envío x1")).await;

        let closing = engine(&store, DecrementPolicy::GlobalPass)
            .close_day(key(DAY))
            .await
            .unwrap();
        assert_eq!(closing.products_sold.get("Envío"), Some(&1));
        assert_eq!(closing.stock_applied.get("Envío"), None);
        assert_eq!(store.stock_of("Paint A").await, Some(9));
    }

    #[tokio::test]
    async fn test_revert_without_closing() {
        let store = store().await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let day = engine.revert_day(key(DAY), "admin@mail.com").await.unwrap_err();
        assert!(matches!(day, ClosingError::NotClosed { .. }));

        let courier = engine
            .revert_courier("r1@mail.com", key(DAY), "admin@mail.com")
            .await
            .unwrap_err();
        assert!(matches!(courier, ClosingError::NotFound { .. }));

        let blank_admin = engine.revert_day(key(DAY), "  ").await.unwrap_err();
        assert!(matches!(blank_admin, ClosingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_global_pass_courier_close_leaves_stock() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        store.insert_order(order("o-2", None, "Paint A x1")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let courier = engine.close_courier("r1", key(DAY)).await.unwrap();
        assert_eq!(courier.products_sold.get("Paint A"), Some(&2));
        assert_eq!(courier.delivered_orders, 1);
        assert!(courier.stock_applied.is_empty());
        assert_eq!(store.stock_of("Paint A").await, Some(10));

        let day = engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(day.products_sold.get("Paint A"), Some(&3));
        assert_eq!(day.stock_applied.get("Paint A"), Some(&3));
        assert_eq!(store.stock_of("Paint A").await, Some(7));
    }

    #[tokio::test]
    async fn test_courier_pass_decrements_each_order_once() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        store.insert_order(order("o-2", None, "Paint A x1")).await;
        let engine = engine(&store, DecrementPolicy::CourierPass);

        let courier = engine.close_courier("r1", key(DAY)).await.unwrap();
        assert_eq!(courier.stock_applied.get("Paint A"), Some(&2));
        assert_eq!(store.stock_of("Paint A").await, Some(8));

        let day = engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(day.products_sold.get("Paint A"), Some(&3));
        // Only the unassigned order is left for the global pass
        assert_eq!(day.stock_applied.get("Paint A"), Some(&1));
        assert_eq!(store.stock_of("Paint A").await, Some(7));

        engine.revert_day(key(DAY), "admin").await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(8));
        engine.revert_courier("r1", key(DAY), "admin").await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(10));
    }

    #[tokio::test]
    async fn test_courier_close_is_not_merged() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::CourierPass);

        engine.close_courier("r1", key(DAY)).await.unwrap();
        let again = engine.close_courier("r1", key(DAY)).await.unwrap_err();
        assert!(matches!(
            again,
            ClosingError::AlreadyClosed { courier: Some(ref c), .. } if c == "r1"
        ));
        assert_eq!(store.stock_of("Paint A").await, Some(8));
    }

    #[tokio::test]
    async fn test_courier_close_after_day_close_is_rejected() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x1")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        engine.close_day(key(DAY)).await.unwrap();
        let err = engine.close_courier("r1", key(DAY)).await.unwrap_err();
        assert!(matches!(err, ClosingError::AlreadyClosed { .. }));
    }

    #[tokio::test]
    async fn test_revert_courier_appends_courier_entry() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::CourierPass);

        engine.close_courier("r1", key(DAY)).await.unwrap();
        engine.revert_courier("r1", key(DAY), "admin").await.unwrap();

        assert!(store.get_courier_closing("r1", key(DAY)).await.unwrap().is_none());
        let trail = engine.audit_trail(key(DAY)).await.unwrap();
        assert_eq!(trail[0].scope, ClosingScope::Courier);
        assert_eq!(trail[0].affected_courier.as_deref(), Some("r1"));

        // Reopened: the courier can close again
        engine.close_courier("r1", key(DAY)).await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_failure_writes_no_closing() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x1 - Paint B x1")).await;
        store.fail_stock_writes_for("Paint B").await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let err = engine.close_day(key(DAY)).await.unwrap_err();
        assert!(err.requires_manual_audit());
        match err {
            ClosingError::PartialStockApplyFailure { applied, failed_product, .. } => {
                assert_eq!(applied.get("Paint A"), Some(&1));
                assert_eq!(failed_product, "Paint B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.get_closing(key(DAY)).await.unwrap().is_none());
        assert_eq!(store.stock_of("Paint A").await, Some(9));
    }

    #[tokio::test]
    async fn test_lost_race_compensates_and_reports_already_closed() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x2")).await;
        store.lose_next_create().await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let err = engine.close_day(key(DAY)).await.unwrap_err();
        assert!(matches!(err, ClosingError::AlreadyClosed { .. }));
        assert_eq!(store.stock_of("Paint A").await, Some(10));
    }

    #[tokio::test]
    async fn test_concurrent_day_close_applies_once() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x2")).await;
        let engine = Arc::new(engine(&store, DecrementPolicy::GlobalPass));

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.close_day(key(DAY)).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.close_day(key(DAY)).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ClosingError::AlreadyClosed { .. }))));
        assert_eq!(store.stock_of("Paint A").await, Some(8));
    }

    #[tokio::test]
    async fn test_concurrent_days_share_the_catalog() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x2")).await;
        let mut next_day = order("o-2", None, "Paint A x3");
        next_day.date = "2024-06-02T15:00:00Z".parse().unwrap();
        store.insert_order(next_day).await;
        store.yield_on_catalog_reads().await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let (first, second) = tokio::join!(
            engine.close_day(key(DAY)),
            engine.close_day(key("2024-06-02")),
        );

        assert_eq!(first.unwrap().stock_applied.get("Paint A"), Some(&2));
        assert_eq!(second.unwrap().stock_applied.get("Paint A"), Some(&3));
        assert_eq!(store.stock_of("Paint A").await, Some(5));
    }

    #[tokio::test]
    async fn test_failed_audit_append_keeps_the_closing() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);
        engine.close_day(key(DAY)).await.unwrap();

        store.fail_next_audit_append().await;
        let err = engine.revert_day(key(DAY), "admin").await.unwrap_err();
        assert!(matches!(err, ClosingError::Store(_)));
        assert!(store.get_closing(key(DAY)).await.unwrap().is_some());
        assert_eq!(store.stock_of("Paint A").await, Some(8));
        assert!(engine.audit_trail(key(DAY)).await.unwrap().is_empty());

        engine.revert_day(key(DAY), "admin").await.unwrap();
        assert!(store.get_closing(key(DAY)).await.unwrap().is_none());
        assert_eq!(store.stock_of("Paint A").await, Some(10));
        assert_eq!(engine.audit_trail(key(DAY)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_audit_append_keeps_the_courier_closing() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::CourierPass);
        engine.close_courier("r1", key(DAY)).await.unwrap();

        store.fail_next_audit_append().await;
        let err = engine.revert_courier("r1", key(DAY), "admin").await.unwrap_err();
        assert!(matches!(err, ClosingError::Store(_)));
        assert!(store.get_courier_closing("r1", key(DAY)).await.unwrap().is_some());
        assert_eq!(store.stock_of("Paint A").await, Some(8));
        assert!(engine.audit_trail(key(DAY)).await.unwrap().is_empty());

        engine.revert_courier("r1", key(DAY), "admin").await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(10));
    }

    #[tokio::test]
    async fn test_courier_pass_late_delivery_is_decremented() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x2")).await;
        let engine = engine(&store, DecrementPolicy::CourierPass);

        let courier = engine.close_courier("r1", key(DAY)).await.unwrap();
        assert_eq!(courier.order_ids, vec!["o-1"]);
        assert_eq!(store.stock_of("Paint A").await, Some(8));

        // Delivered after the courier closed
        store.insert_order(order("o-2", Some("r1"), "Paint A x3")).await;

        let day = engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(day.products_sold.get("Paint A"), Some(&5));
        assert_eq!(day.stock_applied.get("Paint A"), Some(&3));
        assert_eq!(store.stock_of("Paint A").await, Some(5));
    }

    #[tokio::test]
    async fn test_day_status_walks_the_states() {
        let store = store().await;
        store.insert_order(order("o-1", Some("r1"), "Paint A x1")).await;
        store.insert_order(order("o-2", Some("r2"), "Paint A x1")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let status = engine.day_status(key(DAY)).await.unwrap();
        assert_eq!(status.state, DayState::Open);
        assert_eq!(status.pending_couriers.len(), 2);

        engine.close_courier("r1", key(DAY)).await.unwrap();
        let status = engine.day_status(key(DAY)).await.unwrap();
        assert_eq!(status.state, DayState::CourierPartial);
        assert_eq!(status.closed_couriers, vec!["r1"]);

        engine.close_courier("r2", key(DAY)).await.unwrap();
        assert_eq!(
            engine.day_status(key(DAY)).await.unwrap().state,
            DayState::CourierComplete
        );

        engine.close_day(key(DAY)).await.unwrap();
        let status = engine.day_status(key(DAY)).await.unwrap();
        assert_eq!(status.state, DayState::Closed);
        assert!(status.closing.is_some());

        engine.revert_day(key(DAY), "admin").await.unwrap();
        let status = engine.day_status(key(DAY)).await.unwrap();
        assert_eq!(status.state, DayState::Reversed);
        assert_eq!(status.last_reversal.unwrap().acting_admin, "admin");

        // A reversed day closes again
        engine.close_day(key(DAY)).await.unwrap();
    }

    #[tokio::test]
    async fn test_courier_settlement_applies_surcharge() {
        let store = store().await;
        let mut card = order("o-1", Some("r1"), "Paint A x1 | TOTAL: $100");
        card.payment_method = PaymentMethod::Card;
        let mut cash = order("o-2", Some("r1"), "Paint A x1 | TOTAL: $100");
        cash.payment_method = PaymentMethod::Cash;
        store.insert_order(card).await;
        store.insert_order(cash).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);

        let settlement = engine
            .courier_settlement("r1", key(DAY), Money::from_units(50))
            .await
            .unwrap();
        assert_eq!(settlement.card_total, Money::from_units(110));
        assert_eq!(settlement.cash_total, Money::from_units(100));
        assert_eq!(settlement.net_total, Money::from_units(160));

        let negative = engine
            .courier_settlement("r1", key(DAY), Money::from_units(-1))
            .await;
        assert!(matches!(negative, Err(ClosingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_monthly_summary_and_low_stock() {
        let store = store().await;
        store.insert_order(order("o-1", None, "Paint B x3")).await;
        let engine = engine(&store, DecrementPolicy::GlobalPass);
        engine.close_day(key(DAY)).await.unwrap();

        let june = engine.monthly_summary(2024, 6).await.unwrap();
        assert_eq!(june.closings, 1);
        assert_eq!(june.top_product().unwrap().name, "Paint B");
        assert_eq!(engine.monthly_summary(2024, 5).await.unwrap().closings, 0);
        assert!(engine.monthly_summary(2024, 13).await.is_err());

        let low: Vec<String> = engine
            .low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(low, vec!["Paint B"]);
    }

    #[test]
    fn test_month_range() {
        let (first, last) = month_range(2024, 2).unwrap();
        assert_eq!(first.to_string(), "2024-02-01");
        assert_eq!(last.to_string(), "2024-02-29");

        let (_, december) = month_range(2024, 12).unwrap();
        assert_eq!(december.to_string(), "2024-12-31");
        assert!(month_range(2024, 0).is_err());
    }

    #[tokio::test]
    async fn test_sqlite_end_to_end() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&Product::new("p-a", "Paint A", 1000, 10))
            .await
            .unwrap();
        db.orders()
            .insert(&order("o-1", Some("r1"), "Paint A x3 | TOTAL: $3000"))
            .await
            .unwrap();
        db.orders()
            .insert(&order("o-2", None, "Paint A x1 | TOTAL: $1000"))
            .await
            .unwrap();

        let engine = ClosingEngine::new(
            Arc::new(SqliteStore::new(db.clone())),
            EngineConfig::default(),
        );

        assert!(matches!(
            engine.close_day(key(DAY)).await,
            Err(ClosingError::CouriersPending(_))
        ));
        engine.close_courier("r1", key(DAY)).await.unwrap();
        let closing = engine.close_day(key(DAY)).await.unwrap();
        assert_eq!(closing.products_sold.get("Paint A"), Some(&4));

        let stock = |db: Database| async move {
            db.products().get_by_id("p-a").await.unwrap().unwrap().stock_quantity
        };
        assert_eq!(stock(db.clone()).await, 6);

        assert!(matches!(
            engine.close_day(key(DAY)).await,
            Err(ClosingError::AlreadyClosed { .. })
        ));

        engine.revert_day(key(DAY), "admin@mail.com").await.unwrap();
        assert_eq!(stock(db.clone()).await, 10);
        assert_eq!(db.audit_log().count().await.unwrap(), 1);
        assert_eq!(
            engine.day_status(key(DAY)).await.unwrap().state,
            DayState::Reversed
        );
    }
}
