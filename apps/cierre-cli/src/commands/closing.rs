//! Closing and reversal subcommands.

use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::cli::DayArg;
use crate::error::CliError;

pub async fn close_day(ctx: &Context, day: &DayArg) -> Result<Value, CliError> {
    let date_key = ctx.date_key(day)?;
    info!(%date_key, "close-day");

    let closing = ctx.engine.close_day(date_key).await?;
    Ok(serde_json::to_value(closing)?)
}

pub async fn close_courier(ctx: &Context, courier: &str, day: &DayArg) -> Result<Value, CliError> {
    let date_key = ctx.date_key(day)?;
    info!(%date_key, courier, "close-courier");

    let closing = ctx.engine.close_courier(courier, date_key).await?;
    Ok(serde_json::to_value(closing)?)
}

pub async fn revert_day(ctx: &Context, day: &DayArg, admin: &str) -> Result<Value, CliError> {
    let date_key = ctx.date_key(day)?;
    info!(%date_key, admin, "revert-day");

    ctx.engine.revert_day(date_key, admin).await?;
    Ok(json!({ "reverted": true, "scope": "global", "date_key": date_key }))
}

pub async fn revert_courier(
    ctx: &Context,
    courier: &str,
    day: &DayArg,
    admin: &str,
) -> Result<Value, CliError> {
    let date_key = ctx.date_key(day)?;
    info!(%date_key, courier, admin, "revert-courier");

    ctx.engine.revert_courier(courier, date_key, admin).await?;
    Ok(json!({
        "reverted": true,
        "scope": "courier",
        "courier": courier,
        "date_key": date_key,
    }))
}
