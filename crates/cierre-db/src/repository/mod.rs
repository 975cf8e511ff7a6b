//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ProductRepository         catalog reads, absolute stock writes,       │
//! │                            batched stock writes in one transaction     │
//! │                                                                         │
//! │  OrderRepository           orders by UTC range, by courier             │
//! │                                                                         │
//! │  ClosingRepository         daily_closings: get / create-if-absent /    │
//! │  CourierClosingRepository  courier_closings:     delete / list         │
//! │                                                                         │
//! │  AuditLogRepository        append + read. No update, no delete.        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Formats
//! - Timestamps: RFC 3339 UTC with fixed microsecond precision, so TEXT
//!   comparison orders them correctly.
//! - Maps, lists and order snapshots: JSON text.

pub mod audit;
pub mod closing;
pub mod courier_closing;
pub mod order;
pub mod product;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, DbResult};

/// Formats a timestamp for storage.
pub(crate) fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::corrupt(column, e))
}

pub(crate) fn encode_json<T: Serialize>(column: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::corrupt(column, e))
}

pub(crate) fn decode_json<T: DeserializeOwned>(column: &str, value: &str) -> DbResult<T> {
    serde_json::from_str(value).map_err(|e| DbError::corrupt(column, e))
}
