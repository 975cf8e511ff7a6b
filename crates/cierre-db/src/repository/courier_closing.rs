//! # Courier Closing Repository
//!
//! One row per `(courier, business day)`. Same create-if-absent contract as
//! the daily closings, keyed on the pair.

use sqlx::SqlitePool;
use tracing::debug;

use super::{decode_json, decode_timestamp, encode_json, encode_timestamp};
use crate::error::{DbError, DbResult};
use cierre_core::{CourierClosing, DateKey};

const SELECT_COURIER_CLOSING: &str = r#"
    SELECT courier_id, date_key, products_sold, delivered_orders, order_ids,
           stock_applied, created_at
    FROM courier_closings
"#;

#[derive(Debug, sqlx::FromRow)]
struct CourierClosingRow {
    courier_id: String,
    date_key: String,
    products_sold: String,
    delivered_orders: i64,
    order_ids: String,
    stock_applied: String,
    created_at: String,
}

impl TryFrom<CourierClosingRow> for CourierClosing {
    type Error = DbError;

    fn try_from(row: CourierClosingRow) -> DbResult<Self> {
        Ok(CourierClosing {
            date_key: DateKey::parse(&row.date_key)
                .map_err(|e| DbError::corrupt("date_key", e))?,
            delivered_orders: u32::try_from(row.delivered_orders)
                .map_err(|e| DbError::corrupt("delivered_orders", e))?,
            products_sold: decode_json("products_sold", &row.products_sold)?,
            order_ids: decode_json("order_ids", &row.order_ids)?,
            stock_applied: decode_json("stock_applied", &row.stock_applied)?,
            created_at: decode_timestamp("created_at", &row.created_at)?,
            courier_id: row.courier_id,
        })
    }
}

/// Repository for per-courier closings.
#[derive(Debug, Clone)]
pub struct CourierClosingRepository {
    pool: SqlitePool,
}

impl CourierClosingRepository {
    /// Creates a new CourierClosingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CourierClosingRepository { pool }
    }

    /// Gets a courier's closing for a day, if it exists.
    pub async fn get(&self, courier: &str, date_key: DateKey) -> DbResult<Option<CourierClosing>> {
        let row = sqlx::query_as::<_, CourierClosingRow>(&format!(
            "{SELECT_COURIER_CLOSING} WHERE courier_id = ?1 AND date_key = ?2"
        ))
        .bind(courier)
        .bind(date_key.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CourierClosing::try_from).transpose()
    }

    /// Inserts the closing unless the pair already has one. Returns whether it inserted.
    pub async fn create_if_absent(&self, closing: &CourierClosing) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO courier_closings (
                courier_id, date_key, products_sold, delivered_orders, order_ids,
                stock_applied, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (courier_id, date_key) DO NOTHING
            "#,
        )
        .bind(&closing.courier_id)
        .bind(closing.date_key.to_string())
        .bind(encode_json("products_sold", &closing.products_sold)?)
        .bind(i64::from(closing.delivered_orders))
        .bind(encode_json("order_ids", &closing.order_ids)?)
        .bind(encode_json("stock_applied", &closing.stock_applied)?)
        .bind(encode_timestamp(&closing.created_at))
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(
            courier = %closing.courier_id,
            date_key = %closing.date_key,
            created,
            "Create-if-absent courier closing"
        );
        Ok(created)
    }

    /// Deletes a courier's closing. Returns whether a row was deleted.
    pub async fn delete(&self, courier: &str, date_key: DateKey) -> DbResult<bool> {
        let result =
            sqlx::query("DELETE FROM courier_closings WHERE courier_id = ?1 AND date_key = ?2")
                .bind(courier)
                .bind(date_key.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Every courier closing of a day, by courier.
    pub async fn list_for_date(&self, date_key: DateKey) -> DbResult<Vec<CourierClosing>> {
        let rows = sqlx::query_as::<_, CourierClosingRow>(&format!(
            "{SELECT_COURIER_CLOSING} WHERE date_key = ?1 ORDER BY courier_id"
        ))
        .bind(date_key.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CourierClosing::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cierre_core::ProductQuantities;

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn closing(courier: &str, date: &str) -> CourierClosing {
        let products: ProductQuantities = [("Paint A".to_string(), 3)].into();
        CourierClosing {
            courier_id: courier.to_string(),
            date_key: key(date),
            products_sold: products,
            delivered_orders: 2,
            order_ids: vec!["o-1".to_string(), "o-2".to_string()],
            stock_applied: ProductQuantities::new(),
            created_at: "2024-06-01T22:00:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_courier_closing_lifecycle() {
        let repo = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .courier_closings();

        assert!(repo.create_if_absent(&closing("r1", "2024-06-01")).await.unwrap());
        assert!(!repo.create_if_absent(&closing("r1", "2024-06-01")).await.unwrap());
        assert!(repo.create_if_absent(&closing("r2", "2024-06-01")).await.unwrap());
        assert!(repo.create_if_absent(&closing("r1", "2024-06-02")).await.unwrap());

        let stored = repo.get("r1", key("2024-06-01")).await.unwrap().unwrap();
        assert_eq!(stored, closing("r1", "2024-06-01"));

        let day: Vec<_> = repo
            .list_for_date(key("2024-06-01"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.courier_id)
            .collect();
        assert_eq!(day, vec!["r1", "r2"]);

        assert!(repo.delete("r1", key("2024-06-01")).await.unwrap());
        assert!(!repo.delete("r1", key("2024-06-01")).await.unwrap());
        assert!(repo.get("r1", key("2024-06-01")).await.unwrap().is_none());
    }
}
