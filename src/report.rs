use crate::engine::BacktestResult;
use crate::metrics::EquityPoint;
use crate::portfolio::Trade;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

//writes the whole result (summary, trades, curve, anomalies) as pretty json
pub fn write_json(result: &BacktestResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("Failed to write result to {:?}", path))?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<BacktestResult> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let result = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse result {:?}", path))?;
    Ok(result)
}

//one row per closed trade
pub fn write_trades_csv(trades: &[Trade], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    Ok(())
}

//date,equity,drawdown,drawdown_pct,returns
pub fn write_equity_csv(equity_curve: &[EquityPoint], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for point in equity_curve {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}
