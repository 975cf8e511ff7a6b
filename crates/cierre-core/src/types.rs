//! # Domain Types
//!
//! Core domain types used throughout the closing engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │  DailyClosing   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id, date       │   │  date_key (PK)  │       │
//! │  │  name (match)   │   │  delivered      │   │  products_sold  │       │
//! │  │  stock_quantity │   │  assigned_to[0] │   │  per_courier    │       │
//! │  │  min_threshold  │   │  line_items?    │   │  stock_applied  │       │
//! │  └─────────────────┘   │  summary_text?  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CourierClosing  │   │  AuditLogEntry  │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  (courier,date) │   │  scope          │   │  none           │       │
//! │  │  products_sold  │   │  acting_admin   │   │  efectivo       │       │
//! │  │  stock_applied  │   │  reverted qty   │   │  transferencia  │       │
//! │  └─────────────────┘   └─────────────────┘   │  tarjeta        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reversal Recipe
//! Every closing record stores `stock_applied`: the pre-clamp decrements it
//! actually handed to the ledger. Reversals add exactly that back, never a
//! quantity re-derived from orders.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::UNASSIGNED_COURIER;

/// Product name → quantity. Ordered so records and reports are stable.
pub type ProductQuantities = BTreeMap<String, i64>;

// =============================================================================
// Date Key
// =============================================================================

/// Calendar-day identifier (`yyyy-mm-dd`), the idempotency key of a closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    /// Wraps a calendar date.
    pub const fn from_date(date: NaiveDate) -> Self {
        DateKey(date)
    }

    /// Parses a `yyyy-mm-dd` key.
    ///
    /// ## Example
    /// ```rust
    /// use cierre_core::DateKey;
    ///
    /// let key = DateKey::parse("2024-06-01").unwrap();
    /// assert_eq!(key.to_string(), "2024-06-01");
    /// assert!(DateKey::parse("01/06/2024").is_err());
    /// ```
    pub fn parse(value: &str) -> CoreResult<Self> {
        NaiveDate::parse_from_str(value.trim(), Self::FORMAT)
            .map(DateKey)
            .map_err(|_| CoreError::InvalidDateKey {
                value: value.to_string(),
            })
    }

    /// Returns the wrapped date.
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// The business day an instant falls on, for a given offset from UTC.
    pub fn containing(instant: DateTime<Utc>, utc_offset_minutes: i32) -> CoreResult<Self> {
        let offset = fixed_offset(utc_offset_minutes)?;
        Ok(DateKey(instant.with_timezone(&offset).date_naive()))
    }

    /// Half-open UTC range `[start, end)` covering this business day.
    ///
    /// ## Example
    /// ```text
    /// 2024-06-01 at UTC-3:
    ///   start = 2024-06-01T03:00:00Z
    ///   end   = 2024-06-02T03:00:00Z
    /// ```
    pub fn bounds(&self, utc_offset_minutes: i32) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = fixed_offset(utc_offset_minutes)?;
        let invalid = || CoreError::InvalidDateKey {
            value: self.to_string(),
        };

        let next_day = self.0.succ_opt().ok_or_else(invalid)?;
        let start = self.0.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        let end = next_day.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;

        let start = offset.from_local_datetime(&start).single().ok_or_else(invalid)?;
        let end = offset.from_local_datetime(&end).single().ok_or_else(invalid)?;

        Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
    }
}

fn fixed_offset(minutes: i32) -> CoreResult<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(CoreError::InvalidUtcOffset { minutes })
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateKey::parse(s)
    }
}

impl TryFrom<String> for DateKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateKey::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product whose stock the closing decrements.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Unique, case-sensitive. Orders match products by this string.
    pub name: String,

    /// Unit price in the smallest currency unit.
    pub price: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    /// At or under this level the product shows as low stock.
    pub min_stock_threshold: i64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: i64, stock: i64) -> Self {
        Product {
            id: id.into(),
            name: name.into(),
            price,
            stock_quantity: stock,
            min_stock_threshold: 0,
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_units(self.price)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_threshold
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a delivered order was paid. Set by the courier flow.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    /// Not recorded yet.
    #[default]
    #[serde(rename = "none", alias = "")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "none"))]
    Unspecified,
    #[serde(rename = "efectivo")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "efectivo"))]
    Cash,
    #[serde(rename = "transferencia")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "transferencia"))]
    Transfer,
    #[serde(rename = "tarjeta")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "tarjeta"))]
    Card,
}

impl PaymentMethod {
    /// Transfer and card payments carry the reporting surcharge.
    pub const fn is_surcharged(&self) -> bool {
        matches!(self, PaymentMethod::Transfer | PaymentMethod::Card)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Unspecified => "none",
            PaymentMethod::Cash => "efectivo",
            PaymentMethod::Transfer => "transferencia",
            PaymentMethod::Card => "tarjeta",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(PaymentMethod::Unspecified),
            "efectivo" | "cash" => Ok(PaymentMethod::Cash),
            "transferencia" | "transfer" => Ok(PaymentMethod::Transfer),
            "tarjeta" | "card" => Ok(PaymentMethod::Card),
            other => Err(CoreError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A structured line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_name: String,
    pub quantity: i64,
    /// Unit price in the smallest currency unit.
    pub price: i64,
}

impl LineItem {
    pub fn new(product_name: impl Into<String>, quantity: i64, price: i64) -> Self {
        LineItem {
            product_name: product_name.into(),
            quantity,
            price,
        }
    }
}

/// A sale created by the seller flow and delivered by a courier.
///
/// Read-only input for the closing: the core never mutates orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    pub delivered: bool,

    /// Courier emails. Only the first one is authoritative.
    #[serde(default)]
    pub assigned_to: Vec<String>,

    #[serde(default)]
    pub payment_method: PaymentMethod,

    /// Structured lines. Authoritative whenever present and non-empty.
    #[serde(default)]
    pub line_items: Option<Vec<LineItem>>,

    /// Legacy summary: `"<name> x<qty> ($<subtotal>) - ... | TOTAL: $<total>"`.
    #[serde(default)]
    pub summary_text: Option<String>,

    #[serde(default)]
    pub seller_email: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,
}

impl Order {
    /// An undelivered, unassigned order with no content.
    pub fn new(id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Order {
            id: id.into(),
            date,
            delivered: false,
            assigned_to: Vec::new(),
            payment_method: PaymentMethod::Unspecified,
            line_items: None,
            summary_text: None,
            seller_email: None,
            customer_name: None,
            address: None,
            phone: None,
        }
    }

    /// The authoritative courier: the first element of the assignment list.
    pub fn courier(&self) -> Option<&str> {
        self.assigned_to
            .first()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Grouping key for per-courier summaries.
    pub fn courier_key(&self) -> &str {
        self.courier().unwrap_or(UNASSIGNED_COURIER)
    }

    pub fn is_assigned_to(&self, courier: &str) -> bool {
        self.courier() == Some(courier)
    }
}

// =============================================================================
// Closing Records
// =============================================================================

/// The global closing of one business day. At most one per date key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyClosing {
    #[ts(as = "String")]
    pub date_key: DateKey,

    /// Everything extracted from the day's delivered orders.
    pub products_sold: ProductQuantities,

    /// Courier → the order snapshots it settled.
    pub per_courier: BTreeMap<String, Vec<Order>>,

    /// What this record decremented from the catalog (pre-clamp).
    pub stock_applied: ProductQuantities,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DailyClosing {
    pub fn delivered_orders(&self) -> usize {
        self.per_courier.values().map(Vec::len).sum()
    }

    pub fn total_units(&self) -> i64 {
        self.products_sold
            .values()
            .fold(0i64, |acc, qty| acc.saturating_add(*qty))
    }
}

/// A single courier's closing for one business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CourierClosing {
    pub courier_id: String,

    #[ts(as = "String")]
    pub date_key: DateKey,

    pub products_sold: ProductQuantities,

    /// Delivered orders settled, including ones nothing could be extracted from.
    pub delivered_orders: u32,

    /// Ids of the settled orders. An order delivered after the courier closed
    /// is not among them.
    #[serde(default)]
    pub order_ids: Vec<String>,

    /// What this record decremented from the catalog (pre-clamp).
    pub stock_applied: ProductQuantities,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// Which closing a reversal undid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClosingScope {
    Global,
    Courier,
}

impl fmt::Display for ClosingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosingScope::Global => f.write_str("global"),
            ClosingScope::Courier => f.write_str("courier"),
        }
    }
}

/// Append-only record of a reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditLogEntry {
    pub id: String,
    pub scope: ClosingScope,
    #[ts(as = "String")]
    pub date_key: DateKey,
    pub acting_admin: String,
    /// Set only for courier-scope reversals.
    pub affected_courier: Option<String>,
    /// Exactly what the reversal added back to the catalog.
    pub reverted_quantities: ProductQuantities,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn global(
        date_key: DateKey,
        acting_admin: impl Into<String>,
        reverted_quantities: ProductQuantities,
        timestamp: DateTime<Utc>,
    ) -> Self {
        AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            scope: ClosingScope::Global,
            date_key,
            acting_admin: acting_admin.into(),
            affected_courier: None,
            reverted_quantities,
            timestamp,
        }
    }

    pub fn courier(
        date_key: DateKey,
        acting_admin: impl Into<String>,
        courier: impl Into<String>,
        reverted_quantities: ProductQuantities,
        timestamp: DateTime<Utc>,
    ) -> Self {
        AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            scope: ClosingScope::Courier,
            date_key,
            acting_admin: acting_admin.into(),
            affected_courier: Some(courier.into()),
            reverted_quantities,
            timestamp,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key_parse_and_display() {
        let key = DateKey::parse("2024-06-01").unwrap();
        assert_eq!(key.to_string(), "2024-06-01");
        assert_eq!(" 2024-06-01 ".parse::<DateKey>().unwrap(), key);
        assert!(DateKey::parse("2024-02-30").is_err());
        assert!(DateKey::parse("").is_err());
    }

    #[test]
    fn test_date_key_bounds_with_offset() {
        let key = DateKey::parse("2024-06-01").unwrap();
        let (start, end) = key.bounds(-180).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-06-01T03:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-06-02T03:00:00+00:00");

        let (start, end) = key.bounds(0).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn test_date_key_containing() {
        // 01:30 UTC on June 2nd is still June 1st at UTC-3
        let instant = "2024-06-02T01:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            DateKey::containing(instant, -180).unwrap().to_string(),
            "2024-06-01"
        );
        assert!(DateKey::containing(instant, 100_000).is_err());
    }

    #[test]
    fn test_date_key_serde_as_string() {
        let key = DateKey::parse("2024-06-01").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2024-06-01\"");
        let back: DateKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<DateKey>("\"june\"").is_err());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("tarjeta".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("".parse::<PaymentMethod>().unwrap(), PaymentMethod::Unspecified);
        assert!("cheque".parse::<PaymentMethod>().is_err());

        assert!(PaymentMethod::Transfer.is_surcharged());
        assert!(!PaymentMethod::Cash.is_surcharged());
        assert!(!PaymentMethod::Unspecified.is_surcharged());
    }

    #[test]
    fn test_payment_method_serde_uses_spanish_names() {
        let json = serde_json::to_string(&PaymentMethod::Transfer).unwrap();
        assert_eq!(json, "\"transferencia\"");
        let legacy: PaymentMethod = serde_json::from_str("\"\"").unwrap();
        assert_eq!(legacy, PaymentMethod::Unspecified);
    }

    #[test]
    fn test_order_first_courier_is_authoritative() {
        let mut order = Order::new("o-1", Utc::now());
        assert_eq!(order.courier_key(), UNASSIGNED_COURIER);

        order.assigned_to = vec!["r1@mail.com".into(), "r2@mail.com".into()];
        assert_eq!(order.courier(), Some("r1@mail.com"));
        assert!(order.is_assigned_to("r1@mail.com"));
        assert!(!order.is_assigned_to("r2@mail.com"));

        order.assigned_to = vec!["  ".into()];
        assert_eq!(order.courier(), None);
    }

    #[test]
    fn test_product_low_stock() {
        let mut product = Product::new("p-1", "LATEX BLANCO 20L", 15000, 10);
        product.min_stock_threshold = 10;
        assert!(product.is_low_stock());
        product.stock_quantity = 11;
        assert!(!product.is_low_stock());
    }
}
