//! # cierre-db: Database Layer for Cierre de Caja
//!
//! SQLite storage for the catalog, orders, closing records and the audit log,
//! through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cierre de Caja Data Flow                           │
//! │                                                                         │
//! │  cierre-engine (SqliteStore)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cierre-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────────┐  ┌────────────┐ │   │
//! │  │   │   Database    │    │    Repositories     │  │ Migrations │ │   │
//! │  │   │   (pool.rs)   │    │                     │  │ (embedded) │ │   │
//! │  │   │               │    │ ProductRepository   │  │            │ │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepository     │  │ 001_init   │ │   │
//! │  │   │               │    │ ClosingRepository   │  │            │ │   │
//! │  │   │               │    │ CourierClosingRepo  │  │            │ │   │
//! │  │   │               │    │ AuditLogRepository  │  │            │ │   │
//! │  │   └───────────────┘    └─────────────────────┘  └────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (platform data dir / CIERRE_DB_PATH)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cierre_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("cierre.db")).await?;
//! let catalog = db.products().list_all().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::audit::AuditLogRepository;
pub use repository::closing::ClosingRepository;
pub use repository::courier_closing::CourierClosingRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
