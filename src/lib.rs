//a Rust-based day-bar strategy backtesting engine

pub mod batch;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod portfolio;
pub mod report;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{run_batch, summary_table, BatchError, BatchOutcome};
    pub use crate::config::{
        BacktestConfiguration, BreakoutParams, RatchetParams, RsiParams, SmaParams, StrategyParams,
        StrategyType,
    };
    pub use crate::data::{
        filter_by_symbol, load_csv, Bar, CsvDataProvider, DataError, DataProvider, MarketData,
    };
    pub use crate::engine::{
        Anomaly, AnomalyKind, BacktestConfig, BacktestEngine, BacktestResult, RiskPolicy,
    };
    pub use crate::error::BacktestError;
    pub use crate::indicators::{IndicatorFrame, SIGNAL_COLUMN};
    pub use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
    pub use crate::portfolio::{ExitReason, PortfolioState, Position, Side, Trade};
    pub use crate::report::{write_equity_csv, write_json, write_trades_csv};
    pub use crate::strategy::{
        banker_ratchet::BankerRatchetStrategy,
        momentum_breakout::MomentumBreakoutStrategy,
        registry::{RegistryError, StrategyRegistry},
        rsi_reversion::RsiReversionStrategy,
        sma_crossover::SmaCrossoverStrategy,
        Signal, Strategy,
    };
}
