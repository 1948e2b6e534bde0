use crate::data::MarketData;
use crate::engine::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::error::BacktestError;
use crate::strategy::registry::{RegistryError, StrategyRegistry};
use log::info;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Engine(#[from] BacktestError),
}

//one strategy on one symbol
#[derive(Debug)]
pub struct BatchOutcome {
    pub strategy: String,
    pub symbol: String,
    pub result: Result<BacktestResult, BatchError>,
}

//runs every strategy against every symbol in parallel
//each unit gets its own strategy instance and engine; market data is shared read-only
//outcomes come back in strategy-major order, failures are reported per unit
pub fn run_batch(
    registry: &StrategyRegistry,
    strategies: &[String],
    data: &[MarketData],
    config: &BacktestConfig,
) -> Vec<BatchOutcome> {
    let units: Vec<(&String, &MarketData)> = strategies
        .iter()
        .flat_map(|name| data.iter().map(move |d| (name, d)))
        .collect();

    info!(
        "running {} units ({} strategies x {} symbols)",
        units.len(),
        strategies.len(),
        data.len()
    );

    units
        .into_par_iter()
        .map(|(name, market)| BatchOutcome {
            strategy: name.clone(),
            symbol: market.symbol().to_string(),
            result: run_unit(registry, name, market, config),
        })
        .collect()
}

fn run_unit(
    registry: &StrategyRegistry,
    name: &str,
    data: &MarketData,
    config: &BacktestConfig,
) -> Result<BacktestResult, BatchError> {
    let mut strategy = registry.create(name)?;
    let mut engine = BacktestEngine::new(config.clone())?;
    Ok(engine.run(strategy.as_mut(), data))
}

//one row per unit, failed units show their error
pub fn summary_table(outcomes: &[BatchOutcome]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(
        [
            "Strategy", "Symbol", "Return", "Max DD", "Sharpe", "Trades", "Win Rate", "Anomalies",
        ]
        .iter()
        .map(|h| Cell::new(h))
        .collect(),
    ));

    for outcome in outcomes {
        let cells = match &outcome.result {
            Ok(result) => {
                let s = &result.summary;
                vec![
                    outcome.strategy.clone(),
                    outcome.symbol.clone(),
                    format!("{:.2}%", s.total_return_pct * 100.0),
                    format!("{:.2}%", s.max_drawdown_pct * 100.0),
                    format!("{:.2}", s.sharpe_ratio),
                    s.num_trades.to_string(),
                    format!("{:.1}%", s.win_rate * 100.0),
                    result.anomalies.len().to_string(),
                ]
            }
            Err(err) => vec![
                outcome.strategy.clone(),
                outcome.symbol.clone(),
                format!("error: {}", err),
            ],
        };
        table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
    }

    table
}
