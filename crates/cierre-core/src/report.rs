//! # Reports
//!
//! Read-only views over stored closings and the catalog: the monthly
//! statistics panel and the low-stock list.
//!
//! ## Shipping Lines
//! Product names containing "envio", "envío" or "entrega" (any case) are
//! charges, not goods. The monthly product totals leave them out. The seller
//! ranking counts every extracted unit, shipping included.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::extract::{add_quantity, extract_products};
use crate::types::{DailyClosing, Product, ProductQuantities};
use crate::UNKNOWN_SELLER;

/// How many entries the top-N lists keep.
pub const TOP_N: usize = 5;

const SHIPPING_MARKERS: [&str; 3] = ["envio", "envío", "entrega"];

/// True when a product name is a shipping or delivery charge.
pub fn is_shipping_line(name: &str) -> bool {
    let lower = name.to_lowercase();
    SHIPPING_MARKERS.iter().any(|marker| lower.contains(marker))
}

// =============================================================================
// Monthly Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RankedEntry {
    pub name: String,
    pub quantity: i64,
}

/// Statistics over one calendar month of global closings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    /// Global closings that fell in the month.
    pub closings: u32,
    /// Units per product, shipping lines excluded.
    pub products: ProductQuantities,
    /// Units per seller email.
    pub sellers: BTreeMap<String, i64>,
    pub top_products: Vec<RankedEntry>,
    pub top_sellers: Vec<RankedEntry>,
}

impl MonthlySummary {
    pub fn top_product(&self) -> Option<&RankedEntry> {
        self.top_products.first()
    }

    pub fn top_seller(&self) -> Option<&RankedEntry> {
        self.top_sellers.first()
    }
}

/// Builds the monthly statistics from the month's DailyClosings.
///
/// Closings outside `year`/`month` are ignored, so callers may pass a wider set.
pub fn monthly_summary(
    closings: &[DailyClosing],
    year: i32,
    month: u32,
) -> CoreResult<MonthlySummary> {
    if !(1..=12).contains(&month) {
        return Err(CoreError::InvalidMonth(month));
    }

    let mut count = 0;
    let mut products = ProductQuantities::new();
    let mut sellers: BTreeMap<String, i64> = BTreeMap::new();

    let in_month = closings.iter().filter(|c| {
        let date = c.date_key.date();
        date.year() == year && date.month() == month
    });

    for closing in in_month {
        count += 1;

        for (name, qty) in &closing.products_sold {
            if !is_shipping_line(name) {
                add_quantity(&mut products, name, *qty);
            }
        }

        for order in closing.per_courier.values().flatten() {
            let seller = order
                .seller_email
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_SELLER);
            let units = extract_products(order)
                .values()
                .fold(0i64, |acc, qty| acc.saturating_add(*qty));
            add_quantity(&mut sellers, seller, units);
        }
    }

    Ok(MonthlySummary {
        year,
        month,
        closings: count,
        top_products: ranked(&products),
        top_sellers: ranked(&sellers),
        products,
        sellers,
    })
}

/// Highest quantity first, ties by name.
fn ranked(totals: &BTreeMap<String, i64>) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = totals
        .iter()
        .map(|(name, quantity)| RankedEntry {
            name: name.clone(),
            quantity: *quantity,
        })
        .collect();
    entries.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(TOP_N);
    entries
}

// =============================================================================
// Low Stock
// =============================================================================

/// Products at or under their minimum threshold, sorted by name.
pub fn low_stock(products: &[Product]) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .iter()
        .filter(|p| p.is_low_stock())
        .cloned()
        .collect();
    low.sort_by(|a, b| a.name.cmp(&b.name));
    low
}

// =============================================================================
// Unit Tests
// =============================================================================
