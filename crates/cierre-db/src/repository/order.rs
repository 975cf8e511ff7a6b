//! # Order Repository
//!
//! Orders are written by the seller flow (create) and the courier flow
//! (delivery + payment method). The closing only reads them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{decode_json, decode_timestamp, encode_json, encode_timestamp};
use crate::error::{DbError, DbResult};
use cierre_core::{LineItem, Order, PaymentMethod};

const SELECT_ORDER: &str = r#"
    SELECT id, date, delivered, assigned_to, payment_method, line_items,
           summary_text, seller_email, customer_name, address, phone
    FROM orders
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    date: String,
    delivered: bool,
    assigned_to: String,
    payment_method: PaymentMethod,
    line_items: Option<String>,
    summary_text: Option<String>,
    seller_email: Option<String>,
    customer_name: Option<String>,
    address: Option<String>,
    phone: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> DbResult<Self> {
        let line_items = row
            .line_items
            .as_deref()
            .map(|json| decode_json::<Vec<LineItem>>("line_items", json))
            .transpose()?;

        Ok(Order {
            date: decode_timestamp("date", &row.date)?,
            assigned_to: decode_json("assigned_to", &row.assigned_to)?,
            id: row.id,
            delivered: row.delivered,
            payment_method: row.payment_method,
            line_items,
            summary_text: row.summary_text,
            seller_email: row.seller_email,
            customer_name: row.customer_name,
            address: row.address,
            phone: row.phone,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a new order.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, courier = ?order.courier(), "Inserting order");

        let line_items = order
            .line_items
            .as_ref()
            .map(|items| encode_json("line_items", items))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, date, delivered, courier, assigned_to, payment_method,
                line_items, summary_text, seller_email, customer_name, address, phone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&order.id)
        .bind(encode_timestamp(&order.date))
        .bind(order.delivered)
        .bind(order.courier())
        .bind(encode_json("assigned_to", &order.assigned_to)?)
        .bind(order.payment_method)
        .bind(line_items)
        .bind(&order.summary_text)
        .bind(&order.seller_email)
        .bind(&order.customer_name)
        .bind(&order.address)
        .bind(&order.phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// Courier flow: marks an order delivered and records how it was paid.
    pub async fn mark_delivered(&self, id: &str, payment_method: PaymentMethod) -> DbResult<()> {
        debug!(id = %id, payment_method = %payment_method, "Marking order delivered");

        let result = sqlx::query(
            "UPDATE orders SET delivered = 1, payment_method = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(payment_method)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        Ok(())
    }

    /// Delivered orders dated in `[start, end)`, oldest first.
    pub async fn delivered_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE delivered = 1 AND date >= ?1 AND date < ?2 ORDER BY date, id"
        ))
        .bind(encode_timestamp(&start))
        .bind(encode_timestamp(&end))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded delivered orders");
        into_orders(rows)
    }

    /// Orders whose first assignee is `courier`, dated in `[start, end)`.
    ///
    /// Delivered or not: the caller decides what to do with pending ones.
    pub async fn assigned_between(
        &self,
        courier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE courier = ?1 AND date >= ?2 AND date < ?3 ORDER BY date, id"
        ))
        .bind(courier)
        .bind(encode_timestamp(&start))
        .bind(encode_timestamp(&end))
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    /// Counts stored orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
