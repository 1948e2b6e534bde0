pub mod backtest_config;

pub use backtest_config::{
    BacktestConfiguration, BreakoutParams, RatchetParams, RsiParams, SmaParams, StrategyParams,
    StrategyType,
};
