use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use edge_core::Side;
use edge_engine::{EquityPoint, Trade};

/// One row of the trade ledger CSV.
#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    strategy_id: &'a str,
    side: &'static str,
    entry_bar: usize,
    entry_ts: i64,
    entry_price: String,
    exit_bar: usize,
    exit_ts: i64,
    exit_price: String,
    units: String,
    exit_reason: &'static str,
    pnl_gross: String,
    fee: String,
    slippage: String,
    pnl_net: String,
    bars_held: usize,
}

impl<'a> From<&'a Trade> for TradeRow<'a> {
    fn from(t: &'a Trade) -> Self {
        Self {
            strategy_id: &t.strategy_id,
            side: match t.side {
                Side::Long => "long",
                Side::Short => "short",
            },
            entry_bar: t.entry_bar_index,
            entry_ts: t.entry_timestamp,
            entry_price: format!("{:.6}", t.entry_price),
            exit_bar: t.exit_bar_index,
            exit_ts: t.exit_timestamp,
            exit_price: format!("{:.6}", t.exit_price),
            units: format!("{:.6}", t.units),
            exit_reason: t.exit_reason.as_str(),
            pnl_gross: format!("{:.2}", t.pnl_gross),
            fee: format!("{:.2}", t.fee),
            slippage: format!("{:.2}", t.slippage),
            pnl_net: format!("{:.2}", t.pnl_net),
            bars_held: t.bars_held(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EquityRow {
    bar_index: usize,
    timestamp: i64,
    equity: String,
}

/// Write the trade ledger as CSV, one row per closed trade with a header
/// taken from `TradeRow`'s field names.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for t in trades {
        wtr.serialize(TradeRow::from(t))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Write an equity curve as CSV with bar_index, timestamp and equity columns.
pub fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for p in equity {
        wtr.serialize(EquityRow {
            bar_index: p.bar_index,
            timestamp: p.timestamp,
            equity: format!("{:.2}", p.equity),
        })?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Read a return series: one value per line, no header.
pub fn read_returns_csv(path: &Path) -> Result<Vec<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut returns = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("{}: bad record", path.display()))?;
        let field = record.get(0).unwrap_or("").trim();
        if field.is_empty() {
            continue;
        }
        let value: f64 = field
            .parse()
            .with_context(|| format!("{}:{}: `{}` is not a number", path.display(), line + 1, field))?;
        returns.push(value);
    }
    Ok(returns)
}
