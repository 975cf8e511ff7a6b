//! # Daily Closing Repository
//!
//! One row per business day. The primary key on `date_key` is what makes a
//! day close exactly once, even across processes.
//!
//! ```text
//!   create_if_absent(closing)
//!        │
//!        ▼
//!   INSERT ... ON CONFLICT (date_key) DO NOTHING
//!        │
//!        ├── 1 row  → true   (this caller created the day's closing)
//!        └── 0 rows → false  (someone else already did)
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use super::{decode_json, decode_timestamp, encode_json, encode_timestamp};
use crate::error::{DbError, DbResult};
use cierre_core::{DailyClosing, DateKey};

const SELECT_CLOSING: &str = r#"
    SELECT date_key, products_sold, per_courier, stock_applied, created_at
    FROM daily_closings
"#;

#[derive(Debug, sqlx::FromRow)]
struct ClosingRow {
    date_key: String,
    products_sold: String,
    per_courier: String,
    stock_applied: String,
    created_at: String,
}

impl TryFrom<ClosingRow> for DailyClosing {
    type Error = DbError;

    fn try_from(row: ClosingRow) -> DbResult<Self> {
        Ok(DailyClosing {
            date_key: DateKey::parse(&row.date_key)
                .map_err(|e| DbError::corrupt("date_key", e))?,
            products_sold: decode_json("products_sold", &row.products_sold)?,
            per_courier: decode_json("per_courier", &row.per_courier)?,
            stock_applied: decode_json("stock_applied", &row.stock_applied)?,
            created_at: decode_timestamp("created_at", &row.created_at)?,
        })
    }
}

/// Repository for global (per-day) closings.
#[derive(Debug, Clone)]
pub struct ClosingRepository {
    pool: SqlitePool,
}

impl ClosingRepository {
    /// Creates a new ClosingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClosingRepository { pool }
    }

    /// Gets the closing of a day, if it exists.
    pub async fn get(&self, date_key: DateKey) -> DbResult<Option<DailyClosing>> {
        let row = sqlx::query_as::<_, ClosingRow>(&format!("{SELECT_CLOSING} WHERE date_key = ?1"))
            .bind(date_key.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(DailyClosing::try_from).transpose()
    }

    /// Inserts the closing unless the day already has one.
    ///
    /// ## Returns
    /// * `Ok(true)` - inserted
    /// * `Ok(false)` - a closing for the date already existed, nothing written
    pub async fn create_if_absent(&self, closing: &DailyClosing) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_closings (
                date_key, products_sold, per_courier, stock_applied, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (date_key) DO NOTHING
            "#,
        )
        .bind(closing.date_key.to_string())
        .bind(encode_json("products_sold", &closing.products_sold)?)
        .bind(encode_json("per_courier", &closing.per_courier)?)
        .bind(encode_json("stock_applied", &closing.stock_applied)?)
        .bind(encode_timestamp(&closing.created_at))
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        debug!(date_key = %closing.date_key, created, "Create-if-absent daily closing");
        Ok(created)
    }

    /// Deletes the closing of a day. Returns whether a row was deleted.
    pub async fn delete(&self, date_key: DateKey) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM daily_closings WHERE date_key = ?1")
            .bind(date_key.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Closings with `from <= date_key <= to`, oldest first.
    pub async fn list_between(&self, from: DateKey, to: DateKey) -> DbResult<Vec<DailyClosing>> {
        let rows = sqlx::query_as::<_, ClosingRow>(&format!(
            "{SELECT_CLOSING} WHERE date_key >= ?1 AND date_key <= ?2 ORDER BY date_key"
        ))
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyClosing::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
