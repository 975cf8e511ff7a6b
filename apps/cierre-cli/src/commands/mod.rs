//! # Subcommand Handlers
//!
//! ```text
//! commands/
//! ├── mod.rs      ◄─── Context + dispatch
//! ├── closing.rs  ◄─── close-day, close-courier, revert-day, revert-courier
//! └── report.rs   ◄─── status, audit, settlement, monthly, low-stock
//! ```
//!
//! Each handler returns a serialisable value; `main` prints it as JSON.

pub mod closing;
pub mod report;

use chrono::Utc;
use serde_json::Value;

use crate::cli::{Command, DayArg};
use crate::error::CliError;
use cierre_core::validation::validate_date_key;
use cierre_core::DateKey;
use cierre_engine::{ClosingEngine, SqliteStore};

/// What every handler gets.
pub struct Context {
    pub engine: ClosingEngine<SqliteStore>,
}

impl Context {
    pub fn new(engine: ClosingEngine<SqliteStore>) -> Self {
        Context { engine }
    }

    /// The requested business day, or today's.
    pub fn date_key(&self, day: &DayArg) -> Result<DateKey, CliError> {
        match day.date.as_deref() {
            Some(value) => Ok(validate_date_key(value)?),
            None => Ok(DateKey::containing(
                Utc::now(),
                self.engine.config().business_utc_offset_minutes,
            )?),
        }
    }
}

/// Runs one subcommand.
pub async fn dispatch(ctx: &Context, command: Command) -> Result<Value, CliError> {
    match command {
        Command::CloseDay { day } => closing::close_day(ctx, &day).await,
        Command::CloseCourier { courier, day } => closing::close_courier(ctx, &courier, &day).await,
        Command::RevertDay { day, admin } => closing::revert_day(ctx, &day, &admin).await,
        Command::RevertCourier {
            courier,
            day,
            admin,
        } => closing::revert_courier(ctx, &courier, &day, &admin).await,
        Command::Status { day } => report::status(ctx, &day).await,
        Command::Audit { day } => report::audit(ctx, &day).await,
        Command::Settlement {
            courier,
            day,
            expense,
        } => report::settlement(ctx, &courier, &day, expense).await,
        Command::Monthly { year, month } => report::monthly(ctx, year, month).await,
        Command::LowStock => report::low_stock(ctx).await,
    }
}
