//! # Money Module
//!
//! Provides the `Money` type and the order-total rules used by settlement views.
//!
//! ## Where Totals Come From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ORDER TOTAL DERIVATION                                                 │
//! │                                                                         │
//! │  summary_text: "LATEX x2 ($30000) - RODILLO x1 ($4500) | TOTAL: $34500" │
//! │                                                 ───────────────────     │
//! │                                                 extract_total() → 34500 │
//! │                                                                         │
//! │  No marker? Fall back to Σ line_items (quantity × price)                │
//! │                                                                         │
//! │  payment_method ∈ {transferencia, tarjeta}  →  + 10% surcharge          │
//! │                                                                         │
//! │  Display / export only. The stock ledger never sees money.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cierre_core::money::{Money, SurchargeRate};
//!
//! let total = Money::from_units(100);
//! assert_eq!(total.with_surcharge(SurchargeRate::default()).units(), 110);
//! assert_eq!(Money::from_units(1_234_567).to_string(), "$1.234.567");
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::Order;
use crate::DEFAULT_SURCHARGE_BPS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: settlement nets can go negative once expenses are deducted
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No floats**: the surcharge is computed in basis points
/// - **Saturating arithmetic**: totals read from order text are unbounded
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Surcharge amount for this value, rounded half-up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`
    ///
    /// ## Example
    /// ```rust
    /// use cierre_core::money::{Money, SurchargeRate};
    ///
    /// let amount = Money::from_units(105);
    /// // 105 × 10% = 10.5 → 11
    /// assert_eq!(amount.surcharge(SurchargeRate::from_bps(1000)).units(), 11);
    /// ```
    pub fn surcharge(&self, rate: SurchargeRate) -> Money {
        // i128 so large totals can't overflow the intermediate product
        let extra = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(i64::try_from(extra).unwrap_or(if extra < 0 { i64::MIN } else { i64::MAX }))
    }

    /// This value plus its surcharge.
    pub fn with_surcharge(&self, rate: SurchargeRate) -> Money {
        *self + self.surcharge(rate)
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Surcharge Rate
// =============================================================================

/// Surcharge rate in basis points (1 bp = 0.01%). 1000 bps = 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SurchargeRate(u32);

impl SurchargeRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        SurchargeRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        SurchargeRate(0)
    }
}

impl Default for SurchargeRate {
    fn default() -> Self {
        SurchargeRate(DEFAULT_SURCHARGE_BPS)
    }
}

// =============================================================================
// Order Totals
// =============================================================================

fn total_marker() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    // Legacy records sometimes drop the '$'
    PATTERN
        .get_or_init(|| Regex::new(r"TOTAL:\s*\$?(\d+)").ok())
        .as_ref()
}

/// Reads the `TOTAL: $<digits>` marker out of a summary text.
///
/// ## Example
/// ```rust
/// use cierre_core::money::extract_total;
///
/// assert_eq!(extract_total("A x1 ($50) | TOTAL: $50").map(|m| m.units()), Some(50));
/// assert_eq!(extract_total("A x1 ($50)"), None);
/// ```
pub fn extract_total(text: &str) -> Option<Money> {
    let caps = total_marker()?.captures(text)?;
    caps.get(1)?.as_str().parse::<i64>().ok().map(Money)
}

/// Pre-surcharge amount of an order.
///
/// The total marker wins; without one, the structured lines are summed.
pub fn order_base_amount(order: &Order) -> Money {
    if let Some(total) = order.summary_text.as_deref().and_then(extract_total) {
        return total;
    }

    order
        .line_items
        .iter()
        .flatten()
        .filter(|item| item.quantity > 0)
        .map(|item| Money(item.price).multiply_quantity(item.quantity))
        .sum()
}

/// Order amount with the given surcharge applied when the payment method carries one.
pub fn order_amount_with(order: &Order, rate: SurchargeRate) -> Money {
    let base = order_base_amount(order);
    if order.payment_method.is_surcharged() {
        base.with_surcharge(rate)
    } else {
        base
    }
}

/// Order amount under the default 10% surcharge.
pub fn order_amount(order: &Order) -> Money {
    order_amount_with(order, SurchargeRate::default())
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows whole units with '.' as the thousands separator: `$1.234.567`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}", sign, grouped)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
