//! # cierre-core: Pure Business Logic for the Daily Closing
//!
//! This crate holds everything the "Cierre de Caja" needs to compute, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cierre de Caja Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Admin UI / cierre-cli (caller-facing API)            │   │
//! │  │    close_day, close_courier, revert_day, revert_courier         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          cierre-engine (ledger + closing state machine)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cierre-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │  │  types  │ │ extract │ │ aggregate │ │  money  │ │ report │  │   │
//! │  │  │ Order   │ │ "A x2"  │ │ per day   │ │ TOTAL:$ │ │ month  │  │   │
//! │  │  │ Closing │ │ grammar │ │ per cour. │ │ +10%    │ │ stock  │  │   │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └─────────┘ └────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Product, DailyClosing, AuditLogEntry, ...)
//! - [`extract`] - Order → product quantities (structured and free-text paths)
//! - [`aggregate`] - Folding a day's orders into global and per-courier summaries
//! - [`closing`] - Closing state derivation and courier gating
//! - [`money`] - Integer money and the payment surcharge
//! - [`settlement`] - Per-courier cash settlement by payment method
//! - [`report`] - Monthly statistics and low-stock views
//! - [`validation`] - Input validation for caller-facing operations
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, the caller passes the clock in
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all amounts are integers in the smallest currency unit
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use cierre_core::extract::extract_products;
//! use cierre_core::types::{Order, PaymentMethod};
//! use cierre_core::money::order_amount;
//!
//! let mut order = Order::new("o-1", chrono::Utc::now());
//! order.summary_text = Some("Paint A x2 ($200) | TOTAL: $200".to_string());
//! order.payment_method = PaymentMethod::Card;
//!
//! assert_eq!(extract_products(&order).get("Paint A"), Some(&2));
//! assert_eq!(order_amount(&order).units(), 220);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod closing;
pub mod error;
pub mod extract;
pub mod money;
pub mod report;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use closing::{DayState, DayStatus, DecrementPolicy, PendingCourier};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, SurchargeRate};
pub use settlement::CourierSettlement;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Per-courier grouping key for orders without an assigned courier.
pub const UNASSIGNED_COURIER: &str = "unassigned";

/// Seller key used by reports when an order carries no seller email.
pub const UNKNOWN_SELLER: &str = "unknown";

/// Surcharge applied to transfer and card payments, in basis points (10%).
pub const DEFAULT_SURCHARGE_BPS: u32 = 1000;

/// Business-day offset from UTC used when none is configured (UTC-3).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;
