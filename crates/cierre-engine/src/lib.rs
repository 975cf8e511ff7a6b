//! # cierre-engine: Closing Orchestration for Cierre de Caja
//!
//! Runs the daily closing against abstract stores: gating on courier
//! closings, the stock ledger, idempotent persistence and exact reversal.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cierre de Caja Architecture                        │
//! │                                                                         │
//! │  apps/cierre-cli ── close-day / close-courier / revert-* / status ...  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  cierre-engine (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  ClosingEngine ─► ledger::apply ─► ProductStore::adjust_stocks  │   │
//! │  │        │                                                        │   │
//! │  │        ├──► OrderSource     (delivered orders of the day)       │   │
//! │  │        ├──► ClosingStore    (create-if-absent, delete)          │   │
//! │  │        └──► AuditSink       (append-only reversals)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │        │ pure calls                         │ SqliteStore               │
//! │        ▼                                    ▼                           │
//! │   cierre-core                           cierre-db                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`engine`] - `ClosingEngine`, the caller-facing API
//! - [`ledger`] - Stock Ledger (signed adjustments, floor at zero)
//! - [`store`] - Store traits plus `MemoryStore` and `SqliteStore`
//! - [`config`] - `EngineConfig` (env > TOML > defaults)
//! - [`error`] - `ClosingError`, `StoreError`
//!
//! ## Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use cierre_engine::{ClosingEngine, EngineConfig, SqliteStore};
//!
//! let db = cierre_db::Database::new(cierre_db::DbConfig::new("cierre.db")).await?;
//! let engine = ClosingEngine::new(Arc::new(SqliteStore::new(db)), EngineConfig::load(None)?);
//!
//! engine.close_courier("r1@mail.com", date_key).await?;
//! let closing = engine.close_day(date_key).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use engine::ClosingEngine;
pub use error::{BatchWriteError, ClosingError, ClosingResult, StoreError, StoreResult};
pub use ledger::Direction;
pub use store::{
    AuditSink, ClosingBackend, ClosingStore, MemoryStore, OrderSource, ProductStore, SqliteStore,
    StockAdjustment,
};
