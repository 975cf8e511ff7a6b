//! # Cierre de Caja CLI
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr, so stdout stays pure JSON)
//! 2. Parse arguments
//! 3. Load the engine config (env > cierre.toml > defaults), apply `--policy`
//! 4. Determine the database path and connect (migrations run on connect)
//! 5. Dispatch the subcommand, print its JSON result
//!
//! ## Examples
//! ```bash
//! cierre status --date 2024-06-01
//! cierre close-courier --courier repartidor1@pintureria.com --date 2024-06-01
//! cierre close-day --date 2024-06-01
//! cierre revert-day --date 2024-06-01 --admin admin@pintureria.com
//! ```

mod cli;
mod commands;
mod error;

use clap::Parser;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use commands::Context;
use error::CliError;
use cierre_db::{Database, DbConfig};
use cierre_engine::{ClosingEngine, EngineConfig, SqliteStore};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let pretty = cli.pretty;

    match run(cli).await {
        Ok(output) => {
            let rendered = if pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            match rendered {
                Ok(text) => {
                    println!("{}", text);
                    ExitCode::SUCCESS
                }
                Err(e) => report(CliError::from(e)),
            }
        }
        Err(err) => report(err),
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, CliError> {
    let mut config = EngineConfig::load(cli.config.clone())?;
    if let Some(policy) = cli.policy {
        debug!(%policy, "Decrement policy from command line");
        config.decrement_policy = policy;
    }

    let db_path = match cli.db.clone() {
        Some(path) => path,
        None => default_database_path()?,
    };
    info!(?db_path, "Database path determined");

    let db = Database::new(DbConfig::new(db_path)).await?;
    let ctx = Context::new(ClosingEngine::new(Arc::new(SqliteStore::new(db)), config));

    commands::dispatch(&ctx, cli.command).await
}

fn report(err: CliError) -> ExitCode {
    let code = err.code.exit_code();
    match serde_json::to_string(&err) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}", err),
    }
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - Default: `info,cierre=debug,sqlx=warn`
/// - `RUST_LOG` overrides it, e.g. `RUST_LOG=cierre_engine=trace`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cierre=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `cierre.db` in the platform data directory.
///
/// - **macOS**: `~/Library/Application Support/com.cierre.cierre/cierre.db`
/// - **Windows**: `%APPDATA%\cierre\cierre\data\cierre.db`
/// - **Linux**: `~/.local/share/cierre/cierre.db`
///
/// `--db` / `CIERRE_DB_PATH` take precedence.
fn default_database_path() -> Result<PathBuf, CliError> {
    let dirs = ProjectDirs::from("com", "cierre", "cierre")
        .ok_or_else(|| CliError::internal("Could not determine app data directory"))?;

    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("cierre.db"))
}
