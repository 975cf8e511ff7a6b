//! # In-Memory Store
//!
//! All four store traits over plain collections behind one `RwLock`. Used by
//! the engine tests and for dry runs. Create-if-absent runs under the write
//! lock, so it is atomic.
//!
//! Failure injection lets tests reach the partial-failure and lost-race paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuditSink, ClosingStore, OrderSource, ProductStore, StockAdjustment};
use crate::error::{StoreError, StoreResult};
use cierre_core::{AuditLogEntry, CourierClosing, DailyClosing, DateKey, Order, Product};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    orders: Vec<Order>,
    closings: BTreeMap<DateKey, DailyClosing>,
    courier_closings: BTreeMap<(String, DateKey), CourierClosing>,
    audit: Vec<AuditLogEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Stock writes that still succeed before every further one fails.
    stock_writes_left: Option<usize>,
    /// Stock writes to this product name fail.
    failing_product: Option<String>,
    /// The next create-if-absent reports that someone else got there first.
    lose_next_create: bool,
    /// The next audit append fails.
    fail_next_append: bool,
    /// Catalog reads yield to the scheduler before returning.
    yield_on_catalog_read: bool,
}

/// Store backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    faults: RwLock<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.push(product);
    }

    pub async fn insert_order(&self, order: Order) {
        self.tables.write().await.orders.push(order);
    }

    /// Current stock of the product with this exact name.
    pub async fn stock_of(&self, name: &str) -> Option<i64> {
        self.tables
            .read()
            .await
            .products
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.stock_quantity)
    }

    /// The next `count` stock writes succeed, every later one fails.
    pub async fn fail_stock_writes_after(&self, count: usize) {
        self.faults.write().await.stock_writes_left = Some(count);
    }

    /// Stock writes to `name` fail.
    pub async fn fail_stock_writes_for(&self, name: impl Into<String>) {
        self.faults.write().await.failing_product = Some(name.into());
    }

    /// The next create-if-absent returns `false` without writing, as if
    /// another process had created the record first.
    pub async fn lose_next_create(&self) {
        self.faults.write().await.lose_next_create = true;
    }

    /// The next audit append fails without writing.
    pub async fn fail_next_audit_append(&self) {
        self.faults.write().await.fail_next_append = true;
    }

    /// Catalog reads yield before returning, so concurrent callers interleave
    /// between reading the catalog and adjusting it.
    pub async fn yield_on_catalog_reads(&self) {
        self.faults.write().await.yield_on_catalog_read = true;
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    async fn take_lost_create(&self) -> bool {
        std::mem::take(&mut self.faults.write().await.lose_next_create)
    }
}

#[async_trait]
impl OrderSource for MemoryStore {
    async fn orders_delivered_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.delivered && o.date >= start && o.date < end)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn orders_assigned_to(
        &self,
        courier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.is_assigned_to(courier) && o.date >= start && o.date < end)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn all_products(&self) -> StoreResult<Vec<Product>> {
        let products = self.tables.read().await.products.clone();
        if self.faults.read().await.yield_on_catalog_read {
            tokio::task::yield_now().await;
        }
        Ok(products)
    }

    async fn adjust_stock(&self, adjustment: &StockAdjustment) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == adjustment.product_id)
            .ok_or_else(|| StoreError::not_found("Product", adjustment.product_id.as_str()))?;

        let mut faults = self.faults.write().await;
        if faults.failing_product.as_deref() == Some(product.name.as_str()) {
            return Err(StoreError::Unavailable(format!(
                "injected write failure for '{}'",
                product.name
            )));
        }
        if let Some(left) = faults.stock_writes_left.as_mut() {
            if *left == 0 {
                return Err(StoreError::Unavailable(
                    "injected write failure".to_string(),
                ));
            }
            *left -= 1;
        }

        let next = adjustment.apply_to(product.stock_quantity);
        debug!(product = %product.name, from = product.stock_quantity, to = next, "Adjust stock");
        product.stock_quantity = next;
        Ok(())
    }
}

#[async_trait]
impl ClosingStore for MemoryStore {
    async fn get_closing(&self, date_key: DateKey) -> StoreResult<Option<DailyClosing>> {
        Ok(self.tables.read().await.closings.get(&date_key).cloned())
    }

    async fn create_closing_if_absent(&self, closing: &DailyClosing) -> StoreResult<bool> {
        if self.take_lost_create().await {
            return Ok(false);
        }
        let mut tables = self.tables.write().await;
        if tables.closings.contains_key(&closing.date_key) {
            return Ok(false);
        }
        tables.closings.insert(closing.date_key, closing.clone());
        Ok(true)
    }

    async fn delete_closing(&self, date_key: DateKey) -> StoreResult<bool> {
        Ok(self.tables.write().await.closings.remove(&date_key).is_some())
    }

    async fn list_closings(&self, from: DateKey, to: DateKey) -> StoreResult<Vec<DailyClosing>> {
        Ok(self
            .tables
            .read()
            .await
            .closings
            .range(from..=to)
            .map(|(_, closing)| closing.clone())
            .collect())
    }

    async fn get_courier_closing(
        &self,
        courier: &str,
        date_key: DateKey,
    ) -> StoreResult<Option<CourierClosing>> {
        Ok(self
            .tables
            .read()
            .await
            .courier_closings
            .get(&(courier.to_string(), date_key))
            .cloned())
    }

    async fn create_courier_closing_if_absent(
        &self,
        closing: &CourierClosing,
    ) -> StoreResult<bool> {
        if self.take_lost_create().await {
            return Ok(false);
        }
        let key = (closing.courier_id.clone(), closing.date_key);
        let mut tables = self.tables.write().await;
        if tables.courier_closings.contains_key(&key) {
            return Ok(false);
        }
        tables.courier_closings.insert(key, closing.clone());
        Ok(true)
    }

    async fn delete_courier_closing(&self, courier: &str, date_key: DateKey) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .courier_closings
            .remove(&(courier.to_string(), date_key))
            .is_some())
    }

    async fn courier_closings_for(&self, date_key: DateKey) -> StoreResult<Vec<CourierClosing>> {
        Ok(self
            .tables
            .read()
            .await
            .courier_closings
            .values()
            .filter(|c| c.date_key == date_key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append_entry(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        if std::mem::take(&mut self.faults.write().await.fail_next_append) {
            return Err(StoreError::Unavailable(
                "injected audit append failure".to_string(),
            ));
        }
        self.tables.write().await.audit.push(entry.clone());
        Ok(())
    }

    async fn entries_for(&self, date_key: DateKey) -> StoreResult<Vec<AuditLogEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<AuditLogEntry> = tables
            .audit
            .iter()
            .filter(|e| e.date_key == date_key)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cierre_core::ClosingScope;

    fn adjust(id: &str, name: &str, delta: i64) -> StockAdjustment {
        StockAdjustment {
            product_id: id.into(),
            product_name: name.into(),
            delta,
        }
    }

    async fn store_with_catalog() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_product(Product::new("p-a", "Paint A", 100, 10)).await;
        store.insert_product(Product::new("p-b", "Paint B", 100, 10)).await;
        store.insert_product(Product::new("p-c", "Paint C", 100, 10)).await;
        store
    }

    #[tokio::test]
    async fn test_default_batch_reports_landed_prefix() {
        let store = store_with_catalog().await;
        store.fail_stock_writes_for("Paint B").await;

        let err = store
            .adjust_stocks(&[
                adjust("p-a", "Paint A", -3),
                adjust("p-b", "Paint B", -3),
                adjust("p-c", "Paint C", -3),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.landed, 1);
        assert_eq!(err.failed_product.as_deref(), Some("Paint B"));
        assert_eq!(store.stock_of("Paint A").await, Some(7));
        assert_eq!(store.stock_of("Paint B").await, Some(10));
        assert_eq!(store.stock_of("Paint C").await, Some(10));
    }

    #[tokio::test]
    async fn test_adjustments_floor_at_zero() {
        let store = store_with_catalog().await;
        store.adjust_stock(&adjust("p-a", "Paint A", -25)).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(0));
        store.adjust_stock(&adjust("p-a", "Paint A", 25)).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(25));
    }

    #[tokio::test]
    async fn test_write_budget_fault() {
        let store = store_with_catalog().await;
        store.fail_stock_writes_after(2).await;

        assert!(store.adjust_stock(&adjust("p-a", "Paint A", -1)).await.is_ok());
        assert!(store.adjust_stock(&adjust("p-b", "Paint B", -1)).await.is_ok());
        assert!(store.adjust_stock(&adjust("p-c", "Paint C", -1)).await.is_err());

        store.clear_faults().await;
        assert!(store.adjust_stock(&adjust("p-c", "Paint C", -1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_product_id() {
        let store = store_with_catalog().await;
        let err = store.adjust_stock(&adjust("nope", "Nope", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lost_create_is_one_shot() {
        let store = MemoryStore::new();
        let closing = DailyClosing {
            date_key: DateKey::parse("2024-06-01").unwrap(),
            products_sold: Default::default(),
            per_courier: Default::default(),
            stock_applied: Default::default(),
            created_at: Utc::now(),
        };

        store.lose_next_create().await;
        assert!(!store.create_closing_if_absent(&closing).await.unwrap());
        assert!(store.create_closing_if_absent(&closing).await.unwrap());
        assert!(!store.create_closing_if_absent(&closing).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_append_is_one_shot() {
        let store = MemoryStore::new();
        let date_key = DateKey::parse("2024-06-01").unwrap();
        let entry = AuditLogEntry::global(date_key, "admin", Default::default(), Utc::now());

        store.fail_next_audit_append().await;
        assert!(store.append_entry(&entry).await.is_err());
        assert!(store.entries_for(date_key).await.unwrap().is_empty());

        store.append_entry(&entry).await.unwrap();
        let entries = store.entries_for(date_key).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scope, ClosingScope::Global);
    }
}
