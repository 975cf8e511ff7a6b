//! # Product Extraction
//!
//! Turns one order into `product name → quantity`.
//!
//! ## Two Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  line_items present and non-empty?                                      │
//! │        │                                                                │
//! │   yes  ▼                          no                                    │
//! │  ┌───────────────────┐      ┌───────────────────────────────────────┐   │
//! │  │ structured path   │      │ summary_text fallback                 │   │
//! │  │ sum qty per name  │      │ split on " - "                        │   │
//! │  │ skip qty <= 0     │      │ "<name> x<digits>" per segment        │   │
//! │  │ skip blank names  │      │ non-matching segments are dropped     │   │
//! │  └───────────────────┘      └───────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither path fails. An order nothing can be read from yields an empty map.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{LineItem, Order, ProductQuantities};

/// Separator between product segments in a summary text.
pub const SEGMENT_SEPARATOR: &str = " - ";

fn segment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.*?) x(\d+)").ok())
        .as_ref()
}

/// Extracts the products an order consumed.
///
/// ## Example
/// ```rust
/// use cierre_core::extract::extract_products;
/// use cierre_core::types::{LineItem, Order};
///
/// let mut order = Order::new("o-1", chrono::Utc::now());
/// order.summary_text = Some("LATEX BLANCO 20L x2 ($30000) - RODILLO x1 ($4500)".into());
/// let products = extract_products(&order);
/// assert_eq!(products.get("LATEX BLANCO 20L"), Some(&2));
/// assert_eq!(products.get("RODILLO"), Some(&1));
///
/// // Structured lines are authoritative when present
/// order.line_items = Some(vec![LineItem::new("RODILLO", 3, 4500)]);
/// let products = extract_products(&order);
/// assert_eq!(products.len(), 1);
/// assert_eq!(products.get("RODILLO"), Some(&3));
/// ```
pub fn extract_products(order: &Order) -> ProductQuantities {
    match order.line_items.as_deref() {
        Some(items) if !items.is_empty() => from_line_items(items),
        _ => order
            .summary_text
            .as_deref()
            .map(parse_summary_text)
            .unwrap_or_default(),
    }
}

fn from_line_items(items: &[LineItem]) -> ProductQuantities {
    let mut products = ProductQuantities::new();
    for item in items {
        // Names are kept verbatim: the ledger matches them exactly
        if item.product_name.trim().is_empty() || item.quantity <= 0 {
            continue;
        }
        add_quantity(&mut products, &item.product_name, item.quantity);
    }
    products
}

/// Adds `qty` units of `name`, saturating at `i64::MAX`.
pub(crate) fn add_quantity(products: &mut ProductQuantities, name: &str, qty: i64) {
    match products.get_mut(name) {
        Some(total) => *total = total.saturating_add(qty),
        None => {
            products.insert(name.to_string(), qty);
        }
    }
}

/// Parses the legacy free-text summary.
///
/// Grammar, per `" - "`-separated segment: a product name, then the literal
/// `" x"` followed by one or more digits. Anything after the digits is ignored.
///
/// ```text
/// "LATEX BLANCO 20L x2 ($30000) - RODILLO x1 ($4500) | TOTAL: $34500"
///  └──── name ────┘  └qty           └name─┘  └qty
/// ```
pub fn parse_summary_text(text: &str) -> ProductQuantities {
    let mut products = ProductQuantities::new();
    let Some(pattern) = segment_pattern() else {
        return products;
    };

    for segment in text.split(SEGMENT_SEPARATOR) {
        let Some(caps) = pattern.captures(segment.trim_start()) else {
            continue;
        };
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let quantity = caps.get(2).and_then(|m| m.as_str().parse::<i64>().ok());

        match quantity {
            Some(qty) if qty > 0 && !name.is_empty() => add_quantity(&mut products, name, qty),
            _ => continue,
        }
    }
    products
}

// =============================================================================
// Unit Tests
// =============================================================================
