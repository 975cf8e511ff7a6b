//! # Closing State
//!
//! Pure rules of the closing state machine: which couriers gate the global
//! close, how a day's state is derived, and which orders each decrement pass
//! covers.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Open ──close_courier──► CourierPartial ──close_courier──► ...         │
//! │     │                                                        │          │
//! │     │ (no courier has deliveries)                            ▼          │
//! │     └──────────────────────────────────────────────► CourierComplete    │
//! │                                                              │          │
//! │                                                       close_day         │
//! │                                                              ▼          │
//! │                        Reversed ◄──────revert_day─────── Closed         │
//! │                           │                                             │
//! │                           └──── close_day (allowed again) ────►         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Open is implicit: there is no record for it. Reversed is read off the audit
//! log when no DailyClosing exists.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::types::{AuditLogEntry, DailyClosing, DateKey, Order};

// =============================================================================
// Day State
// =============================================================================

/// Derived state of one business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    /// No closing yet and no courier has closed.
    Open,
    /// Some couriers closed, others with deliveries have not.
    CourierPartial,
    /// Every courier with deliveries has closed. The global close may run.
    CourierComplete,
    /// The DailyClosing exists.
    Closed,
    /// A global reversal removed the DailyClosing. May be closed again.
    Reversed,
}

/// A courier blocking the global close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PendingCourier {
    pub courier: String,
    /// Delivered orders that courier has on the date.
    pub delivered: u32,
}

impl fmt::Display for PendingCourier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} delivered)", self.courier, self.delivered)
    }
}

/// Read-only snapshot of a day, as shown to the admin before closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayStatus {
    #[ts(as = "String")]
    pub date_key: DateKey,
    pub state: DayState,
    pub delivered_orders: u32,
    pub pending_couriers: Vec<PendingCourier>,
    pub closed_couriers: Vec<String>,
    pub closing: Option<DailyClosing>,
    pub last_reversal: Option<AuditLogEntry>,
}

// =============================================================================
// Decrement Policy
// =============================================================================

/// Which closing pass decrements the catalog.
///
/// ```text
/// GlobalPass:   close_courier → no stock change
///               close_day     → full day summary
///
/// CourierPass:  close_courier → that courier's summary
///               close_day     → only orders no courier closing covered
/// ```
/// Every record stores what it applied, so reversal is exact under both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DecrementPolicy {
    #[default]
    GlobalPass,
    CourierPass,
}

impl DecrementPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DecrementPolicy::GlobalPass => "global_pass",
            DecrementPolicy::CourierPass => "courier_pass",
        }
    }

    pub const fn courier_close_decrements(&self) -> bool {
        matches!(self, DecrementPolicy::CourierPass)
    }
}

impl fmt::Display for DecrementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecrementPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "global_pass" | "global" => Ok(DecrementPolicy::GlobalPass),
            "courier_pass" | "courier" => Ok(DecrementPolicy::CourierPass),
            other => Err(CoreError::UnknownDecrementPolicy(other.to_string())),
        }
    }
}

// =============================================================================
// Gating Rules
// =============================================================================

/// Courier → delivered order count. Unassigned orders gate nothing.
pub fn couriers_with_deliveries<'a, I>(orders: I) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut counts = BTreeMap::new();
    for order in orders.into_iter().filter(|o| o.delivered) {
        if let Some(courier) = order.courier() {
            *counts.entry(courier.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Couriers with deliveries and no courier closing, in name order.
///
/// ## Example
/// ```rust
/// use std::collections::{BTreeMap, BTreeSet};
/// use cierre_core::closing::pending_couriers;
///
/// let deliveries = BTreeMap::from([("r1".to_string(), 3), ("r2".to_string(), 1)]);
/// let closed = BTreeSet::from(["r2".to_string()]);
///
/// let pending = pending_couriers(&deliveries, &closed);
/// assert_eq!(pending.len(), 1);
/// assert_eq!(pending[0].courier, "r1");
/// assert_eq!(pending[0].delivered, 3);
/// ```
pub fn pending_couriers(
    deliveries: &BTreeMap<String, u32>,
    closed: &BTreeSet<String>,
) -> Vec<PendingCourier> {
    deliveries
        .iter()
        .filter(|(courier, _)| !closed.contains(*courier))
        .map(|(courier, delivered)| PendingCourier {
            courier: courier.clone(),
            delivered: *delivered,
        })
        .collect()
}

/// Derives the day state from what the stores hold.
pub fn derive_state(
    has_closing: bool,
    reversed: bool,
    delivered_orders: u32,
    pending: &[PendingCourier],
    closed_couriers: usize,
) -> DayState {
    if has_closing {
        DayState::Closed
    } else if reversed {
        DayState::Reversed
    } else if pending.is_empty() && (delivered_orders > 0 || closed_couriers > 0) {
        DayState::CourierComplete
    } else if closed_couriers > 0 {
        DayState::CourierPartial
    } else {
        DayState::Open
    }
}

/// Orders the global close decrements under [`DecrementPolicy::CourierPass`]:
/// those no courier closing settled.
pub fn uncovered_orders<'a>(orders: &'a [Order], settled: &BTreeSet<String>) -> Vec<&'a Order> {
    orders
        .iter()
        .filter(|order| !settled.contains(&order.id))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
