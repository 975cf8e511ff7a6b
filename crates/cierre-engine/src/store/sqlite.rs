//! # SQLite Store
//!
//! Store traits over `cierre_db` repositories. Stock batches run in one
//! transaction, so a failed batch lands nothing, and each delta is applied
//! by SQLite against the current row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuditSink, ClosingStore, OrderSource, ProductStore, StockAdjustment};
use crate::error::{BatchWriteError, StoreError, StoreResult};
use cierre_core::{AuditLogEntry, CourierClosing, DailyClosing, DateKey, Order, Product};
use cierre_db::{Database, DbError};

/// Store backed by the SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl OrderSource for SqliteStore {
    async fn orders_delivered_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().delivered_between(start, end).await?)
    }

    async fn orders_assigned_to(
        &self,
        courier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().assigned_between(courier, start, end).await?)
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn all_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.db.products().list_all().await?)
    }

    async fn adjust_stock(&self, adjustment: &StockAdjustment) -> StoreResult<()> {
        Ok(self
            .db
            .products()
            .adjust_stock(&adjustment.product_id, adjustment.delta)
            .await?)
    }

    async fn adjust_stocks(
        &self,
        adjustments: &[StockAdjustment],
    ) -> Result<usize, BatchWriteError> {
        let deltas: Vec<(String, i64)> = adjustments
            .iter()
            .map(|a| (a.product_id.clone(), a.delta))
            .collect();

        self.db
            .products()
            .adjust_stocks(&deltas)
            .await
            .map_err(|err| {
                let failed_product = match &err {
                    DbError::NotFound { id, .. } => adjustments
                        .iter()
                        .find(|a| &a.product_id == id)
                        .map(|a| a.product_name.clone()),
                    _ => None,
                };
                // The transaction rolled back
                BatchWriteError {
                    landed: 0,
                    failed_product,
                    source: StoreError::Database(err),
                }
            })
    }
}

#[async_trait]
impl ClosingStore for SqliteStore {
    async fn get_closing(&self, date_key: DateKey) -> StoreResult<Option<DailyClosing>> {
        Ok(self.db.closings().get(date_key).await?)
    }

    async fn create_closing_if_absent(&self, closing: &DailyClosing) -> StoreResult<bool> {
        Ok(self.db.closings().create_if_absent(closing).await?)
    }

    async fn delete_closing(&self, date_key: DateKey) -> StoreResult<bool> {
        Ok(self.db.closings().delete(date_key).await?)
    }

    async fn list_closings(&self, from: DateKey, to: DateKey) -> StoreResult<Vec<DailyClosing>> {
        Ok(self.db.closings().list_between(from, to).await?)
    }

    async fn get_courier_closing(
        &self,
        courier: &str,
        date_key: DateKey,
    ) -> StoreResult<Option<CourierClosing>> {
        Ok(self.db.courier_closings().get(courier, date_key).await?)
    }

    async fn create_courier_closing_if_absent(
        &self,
        closing: &CourierClosing,
    ) -> StoreResult<bool> {
        Ok(self.db.courier_closings().create_if_absent(closing).await?)
    }

    async fn delete_courier_closing(&self, courier: &str, date_key: DateKey) -> StoreResult<bool> {
        Ok(self.db.courier_closings().delete(courier, date_key).await?)
    }

    async fn courier_closings_for(&self, date_key: DateKey) -> StoreResult<Vec<CourierClosing>> {
        Ok(self.db.courier_closings().list_for_date(date_key).await?)
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn append_entry(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        Ok(self.db.audit_log().append(entry).await?)
    }

    async fn entries_for(&self, date_key: DateKey) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self.db.audit_log().entries_for(date_key).await?)
    }
}
