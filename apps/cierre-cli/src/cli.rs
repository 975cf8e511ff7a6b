//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use cierre_core::DecrementPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "cierre",
    version,
    about = "Daily cash closing and stock reconciliation"
)]
pub struct Cli {
    /// SQLite database file (default: platform data directory)
    #[arg(long, global = true, env = "CIERRE_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Engine config file (default: platform config directory)
    #[arg(long, global = true, env = "CIERRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the configured decrement policy (global_pass | courier_pass)
    #[arg(long, global = true)]
    pub policy: Option<DecrementPolicy>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Business day selector. Defaults to today in the configured offset.
#[derive(Args, Debug, Clone)]
pub struct DayArg {
    /// Business day, yyyy-mm-dd
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Close the whole business day
    CloseDay {
        #[command(flatten)]
        day: DayArg,
    },

    /// Close one courier's deliveries for the day
    CloseCourier {
        #[arg(long)]
        courier: String,
        #[command(flatten)]
        day: DayArg,
    },

    /// Revert the day's closing and restore stock
    RevertDay {
        #[command(flatten)]
        day: DayArg,
        /// Admin performing the reversal
        #[arg(long)]
        admin: String,
    },

    /// Revert one courier's closing and restore its stock
    RevertCourier {
        #[arg(long)]
        courier: String,
        #[command(flatten)]
        day: DayArg,
        #[arg(long)]
        admin: String,
    },

    /// Day state, pending couriers and the closing if any
    Status {
        #[command(flatten)]
        day: DayArg,
    },

    /// Reversal history of the day
    Audit {
        #[command(flatten)]
        day: DayArg,
    },

    /// A courier's cash settlement for the day
    Settlement {
        #[arg(long)]
        courier: String,
        #[command(flatten)]
        day: DayArg,
        /// Extra delivery expense deducted from the total
        #[arg(long, default_value_t = 0)]
        expense: i64,
    },

    /// Monthly product and seller statistics
    Monthly {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },

    /// Products at or under their minimum stock
    LowStock,
}
