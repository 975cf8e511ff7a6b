//! # Aggregation
//!
//! Folds a day's delivered orders into the global product summary and the
//! per-courier grouping.
//!
//! ```text
//!  orders ──► extract_products() per order ──┬──► products: Σ qty per name
//!                                            │
//!                                            └──► per_courier: courier → [Order]
//!                                                 (first assignee, or "unassigned")
//! ```
//!
//! Shipping lines ("envío", "entrega") stay in this summary. Only the
//! reporting views in [`crate::report`] leave them out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extract::{add_quantity, extract_products};
use crate::types::{Order, ProductQuantities};

/// Result of aggregating one day (or one courier's share of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Σ quantity per product name.
    pub products: ProductQuantities,

    /// Courier key → the orders it delivered, in input order.
    pub per_courier: BTreeMap<String, Vec<Order>>,
}

impl DaySummary {
    /// True when no product could be extracted from any order.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.per_courier.values().map(Vec::len).sum()
    }
}

/// Aggregates orders. The caller passes only delivered orders.
///
/// Orders with nothing extractable still land in `per_courier`.
///
/// ## Example
/// ```rust
/// use cierre_core::aggregate::aggregate;
/// use cierre_core::types::Order;
///
/// let mut a = Order::new("o-1", chrono::Utc::now());
/// a.assigned_to = vec!["r1@mail.com".into()];
/// a.summary_text = Some("Paint A x2".into());
///
/// let mut b = Order::new("o-2", chrono::Utc::now());
/// b.summary_text = Some("no products here".into());
///
/// let summary = aggregate(&[a, b]);
/// assert_eq!(summary.products.get("Paint A"), Some(&2));
/// assert_eq!(summary.per_courier["r1@mail.com"].len(), 1);
/// assert_eq!(summary.per_courier["unassigned"].len(), 1);
/// ```
pub fn aggregate<'a, I>(orders: I) -> DaySummary
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut summary = DaySummary::default();

    for order in orders {
        merge_into(&mut summary.products, &extract_products(order));
        summary
            .per_courier
            .entry(order.courier_key().to_string())
            .or_default()
            .push(order.clone());
    }

    summary
}

/// Adds every quantity of `source` into `target`, saturating at `i64::MAX`.
pub fn merge_into(target: &mut ProductQuantities, source: &ProductQuantities) {
    for (name, qty) in source {
        add_quantity(target, name, *qty);
    }
}

/// Σ quantities across several summaries.
pub fn sum_quantities<'a, I>(maps: I) -> ProductQuantities
where
    I: IntoIterator<Item = &'a ProductQuantities>,
{
    let mut total = ProductQuantities::new();
    for map in maps {
        merge_into(&mut total, map);
    }
    total
}

// =============================================================================
// Unit Tests
// =============================================================================
