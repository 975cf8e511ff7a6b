//! # Stock Ledger
//!
//! The only path through which closings touch the catalog.
//!
//! ```text
//!   deltas {name → qty}
//!        │
//!        ▼
//!   plan_adjustments(catalog)     exact name match, unknown names skipped
//!        │                        Decrement: -qty   Increment: +qty
//!        ▼
//!   ProductStore::adjust_stocks   one batch per closing, applied by the
//!        │                        store against current stock, floor 0
//!        │
//!        ├── all landed      → Ok(applied)
//!        ├── none landed     → ClosingError::Store
//!        └── some landed     → ClosingError::PartialStockApplyFailure
//! ```
//!
//! `applied` holds the requested (pre-clamp) quantity of every matched
//! product. Closings store it and reversals add it back.
//!
//! The catalog snapshot is only used to resolve names to ids. Stock levels
//! are never computed here, so concurrent batches cannot overwrite each other.

use std::collections::HashMap;
use tracing::{debug, error};

use crate::error::{ClosingError, ClosingResult};
use crate::store::{ProductStore, StockAdjustment};
use cierre_core::{Product, ProductQuantities};

/// Which way a set of deltas moves stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A closing: stock goes down, never below zero.
    Decrement,
    /// A reversal or a compensation: stock goes back up.
    Increment,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Decrement => Direction::Increment,
            Direction::Increment => Direction::Decrement,
        }
    }

    fn signed(self, qty: i64) -> i64 {
        match self {
            Direction::Decrement => qty.saturating_neg(),
            Direction::Increment => qty,
        }
    }
}

/// Resolves `deltas` against the catalog into signed adjustments.
///
/// Returns the adjustments and the quantities they account for. Non-positive
/// quantities and names absent from the catalog produce no adjustment.
pub fn plan_adjustments(
    catalog: &[Product],
    deltas: &ProductQuantities,
    direction: Direction,
) -> (Vec<StockAdjustment>, ProductQuantities) {
    let mut by_name: HashMap<&str, &Product> = HashMap::with_capacity(catalog.len());
    for product in catalog {
        by_name.entry(product.name.as_str()).or_insert(product);
    }

    let mut adjustments = Vec::new();
    let mut applied = ProductQuantities::new();

    for (name, &qty) in deltas {
        if qty <= 0 {
            continue;
        }
        let Some(product) = by_name.get(name.as_str()) else {
            debug!(product = %name, delta = qty, "Product not in catalog, skipped");
            continue;
        };

        adjustments.push(StockAdjustment {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            delta: direction.signed(qty),
        });
        applied.insert(name.clone(), qty);
    }

    (adjustments, applied)
}

/// Applies `deltas` to the catalog as one batch and returns what was applied.
pub async fn apply<P>(
    store: &P,
    deltas: &ProductQuantities,
    direction: Direction,
) -> ClosingResult<ProductQuantities>
where
    P: ProductStore + ?Sized,
{
    if deltas.is_empty() {
        return Ok(ProductQuantities::new());
    }

    let catalog = store.all_products().await?;
    let (adjustments, applied) = plan_adjustments(&catalog, deltas, direction);
    if adjustments.is_empty() {
        return Ok(applied);
    }

    match store.adjust_stocks(&adjustments).await {
        Ok(_) => {
            debug!(?direction, products = adjustments.len(), "Stock batch applied");
            Ok(applied)
        }
        Err(err) if err.landed == 0 => Err(ClosingError::Store(err.source)),
        Err(err) => {
            let landed: ProductQuantities = adjustments
                .iter()
                .take(err.landed)
                .filter_map(|a| applied.get_key_value(&a.product_name))
                .map(|(name, qty)| (name.clone(), *qty))
                .collect();
            let failed_product = err
                .failed_product
                .unwrap_or_else(|| "unknown".to_string());

            error!(
                ?direction,
                landed = landed.len(),
                failed = %failed_product,
                reason = %err.source,
                "Stock batch partially applied, manual audit required"
            );

            Err(ClosingError::PartialStockApplyFailure {
                applied: landed,
                failed_product,
                reason: err.source.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn deltas(items: &[(&str, i64)]) -> ProductQuantities {
        items.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    async fn catalog(items: &[(&str, i64)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, (name, stock)) in items.iter().enumerate() {
            store
                .insert_product(Product::new(format!("p-{}", i), *name, 100, *stock))
                .await;
        }
        store
    }

    #[test]
    fn test_plan_records_requested_quantity() {
        let products = vec![Product::new("p-1", "Paint A", 100, 3)];
        let (adjustments, applied) =
            plan_adjustments(&products, &deltas(&[("Paint A", 5)]), Direction::Decrement);

        assert_eq!(adjustments[0].delta, -5);
        assert_eq!(adjustments[0].apply_to(3), 0);
        // The requested quantity is recorded, not the clamped one
        assert_eq!(applied, deltas(&[("Paint A", 5)]));

        let (adjustments, _) =
            plan_adjustments(&products, &deltas(&[("Paint A", 5)]), Direction::Increment);
        assert_eq!(adjustments[0].delta, 5);
    }

    #[test]
    fn test_plan_skips_unknown_and_non_positive() {
        let products = vec![Product::new("p-1", "Paint A", 100, 3)];
        let (adjustments, applied) = plan_adjustments(
            &products,
            &deltas(&[("Paint A", 0), ("paint a", 1), ("Mystery", 2)]),
            Direction::Decrement,
        );

        assert!(adjustments.is_empty());
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_decrement_then_increment_restores_stock() {
        let store = catalog(&[("Paint A", 10), ("Paint B", 2)]).await;
        let sold = deltas(&[("Paint A", 4), ("Paint B", 5)]);

        let applied = apply(&store, &sold, Direction::Decrement).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(6));
        assert_eq!(store.stock_of("Paint B").await, Some(0));

        apply(&store, &applied, Direction::Increment).await.unwrap();
        assert_eq!(store.stock_of("Paint A").await, Some(10));
        // q > s: reversal leaves q, not the original s
        assert_eq!(store.stock_of("Paint B").await, Some(5));
    }

    #[tokio::test]
    async fn test_interleaved_batches_both_count() {
        let store = catalog(&[("Paint A", 10)]).await;
        store.yield_on_catalog_reads().await;

        let first = deltas(&[("Paint A", 2)]);
        let second = deltas(&[("Paint A", 3)]);
        let (a, b) = tokio::join!(
            apply(&store, &first, Direction::Decrement),
            apply(&store, &second, Direction::Decrement),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(store.stock_of("Paint A").await, Some(5));
    }

    #[tokio::test]
    async fn test_partial_failure_reports_landed_products() {
        let store = catalog(&[("Paint A", 10), ("Paint B", 10), ("Paint C", 10)]).await;
        store.fail_stock_writes_for("Paint B").await;

        let err = apply(
            &store,
            &deltas(&[("Paint A", 1), ("Paint B", 1), ("Paint C", 1)]),
            Direction::Decrement,
        )
        .await
        .unwrap_err();

        match err {
            ClosingError::PartialStockApplyFailure {
                applied,
                failed_product,
                ..
            } => {
                assert_eq!(applied, deltas(&[("Paint A", 1)]));
                assert_eq!(failed_product, "Paint B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_before_any_write_is_a_store_error() {
        let store = catalog(&[("Paint A", 10)]).await;
        store.fail_stock_writes_after(0).await;

        let err = apply(&store, &deltas(&[("Paint A", 1)]), Direction::Decrement)
            .await
            .unwrap_err();
        assert!(matches!(err, ClosingError::Store(_)));
        assert_eq!(store.stock_of("Paint A").await, Some(10));
    }
}
