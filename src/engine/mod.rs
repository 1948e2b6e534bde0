pub mod anomaly;
pub mod backtest;
pub mod execution;
pub mod risk;

pub use anomaly::{Anomaly, AnomalyKind};
pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult};
pub use execution::{EntryCost, ExecutionModel};
pub use risk::RiskPolicy;
