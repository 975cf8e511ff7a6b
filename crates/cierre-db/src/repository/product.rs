//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  The stock ledger sends signed deltas. SQLite applies them against     │
//! │  the current row, floored at zero:                                     │
//! │     UPDATE products                                                     │
//! │     SET stock_quantity = MAX(0, stock_quantity + ?2) WHERE id = ?1     │
//! │                                                                         │
//! │  A closing adjusts all of its products through adjust_stocks():        │
//! │     BEGIN → UPDATE × N → COMMIT                                        │
//! │  Any failing UPDATE rolls the whole batch back.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::encode_timestamp;
use crate::error::{DbError, DbResult};
use cierre_core::Product;

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, price, stock_quantity, min_stock_threshold
    FROM products
"#;

const ADJUST_STOCK: &str = r#"
    UPDATE products
    SET stock_quantity = MAX(0, stock_quantity + ?2), updated_at = ?3
    WHERE id = ?1
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists the whole catalog, sorted by name.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Loaded catalog");
        Ok(products)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the name (or id) already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, price, stock_quantity, min_stock_threshold, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.min_stock_threshold)
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Moves the stock of one product by `delta`, never below zero.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta, "Adjusting stock");

        let result = sqlx::query(ADJUST_STOCK)
            .bind(id)
            .bind(delta)
            .bind(encode_timestamp(&Utc::now()))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Applies several stock deltas in one transaction. All land or none do.
    ///
    /// Each delta is applied to the row as it stands inside the transaction,
    /// so concurrent batches on the same product add up.
    ///
    /// ## Returns
    /// The number of products adjusted.
    pub async fn adjust_stocks(&self, deltas: &[(String, i64)]) -> DbResult<usize> {
        debug!(count = deltas.len(), "Adjusting stock batch");

        let now = encode_timestamp(&Utc::now());
        let mut tx = self.pool.begin().await?;

        for (id, delta) in deltas {
            let result = sqlx::query(ADJUST_STOCK)
                .bind(id)
                .bind(delta)
                .bind(&now)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                // Dropping tx rolls back everything written so far
                return Err(DbError::not_found("Product", id));
            }
        }

        tx.commit().await?;
        Ok(deltas.len())
    }

    /// Counts catalog products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn repo_with(products: &[(&str, &str, i64)]) -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        for (id, name, stock) in products {
            repo.insert(&Product::new(*id, *name, 100, *stock)).await.unwrap();
        }
        repo
    }

    async fn stock(repo: &ProductRepository, id: &str) -> i64 {
        repo.get_by_id(id).await.unwrap().unwrap().stock_quantity
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = repo_with(&[("p-1", "Paint A", 10), ("p-2", "Brush", 3)]).await;

        assert_eq!(repo.count().await.unwrap(), 2);
        let names: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Brush", "Paint A"]);

        let paint = repo.get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(paint.name, "Paint A");
        assert_eq!(paint.stock_quantity, 10);
        assert!(repo.get_by_id("p-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = repo_with(&[("p-1", "Paint A", 10)]).await;
        let err = repo
            .insert(&Product::new("p-9", "Paint A", 100, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_floors_at_zero() {
        let repo = repo_with(&[("p-1", "Paint A", 10)]).await;

        repo.adjust_stock("p-1", -4).await.unwrap();
        assert_eq!(stock(&repo, "p-1").await, 6);
        repo.adjust_stock("p-1", -9).await.unwrap();
        assert_eq!(stock(&repo, "p-1").await, 0);
        repo.adjust_stock("p-1", 9).await.unwrap();
        assert_eq!(stock(&repo, "p-1").await, 9);

        assert!(matches!(
            repo.adjust_stock("missing", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_stocks_is_all_or_nothing() {
        let repo = repo_with(&[("p-1", "Paint A", 10), ("p-2", "Brush", 3)]).await;

        let written = repo
            .adjust_stocks(&[("p-1".into(), -3), ("p-2".into(), -2)])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let err = repo
            .adjust_stocks(&[("p-1".into(), -7), ("missing".into(), 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // The first write of the failed batch was rolled back
        assert_eq!(stock(&repo, "p-1").await, 7);
        assert_eq!(stock(&repo, "p-2").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_batches_add_up() {
        let repo = repo_with(&[("p-1", "Paint A", 10)]).await;

        let first: [(String, i64); 1] = [("p-1".into(), -2)];
        let second: [(String, i64); 1] = [("p-1".into(), -3)];
        let (a, b) = tokio::join!(repo.adjust_stocks(&first), repo.adjust_stocks(&second),);
        a.unwrap();
        b.unwrap();

        assert_eq!(stock(&repo, "p-1").await, 5);
    }
}
