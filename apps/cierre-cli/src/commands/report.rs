//! Read-only subcommands.

use serde_json::Value;

use super::Context;
use crate::cli::DayArg;
use crate::error::CliError;
use cierre_core::Money;

pub async fn status(ctx: &Context, day: &DayArg) -> Result<Value, CliError> {
    let status = ctx.engine.day_status(ctx.date_key(day)?).await?;
    Ok(serde_json::to_value(status)?)
}

pub async fn audit(ctx: &Context, day: &DayArg) -> Result<Value, CliError> {
    let entries = ctx.engine.audit_trail(ctx.date_key(day)?).await?;
    Ok(serde_json::to_value(entries)?)
}

pub async fn settlement(
    ctx: &Context,
    courier: &str,
    day: &DayArg,
    expense: i64,
) -> Result<Value, CliError> {
    let settlement = ctx
        .engine
        .courier_settlement(courier, ctx.date_key(day)?, Money::from_units(expense))
        .await?;
    Ok(serde_json::to_value(settlement)?)
}

pub async fn monthly(ctx: &Context, year: i32, month: u32) -> Result<Value, CliError> {
    let summary = ctx.engine.monthly_summary(year, month).await?;
    Ok(serde_json::to_value(summary)?)
}

pub async fn low_stock(ctx: &Context) -> Result<Value, CliError> {
    let products = ctx.engine.low_stock().await?;
    Ok(serde_json::to_value(products)?)
}
