use crate::engine::BacktestConfig;
use crate::strategy::banker_ratchet::BankerRatchetStrategy;
use crate::strategy::momentum_breakout::MomentumBreakoutStrategy;
use crate::strategy::rsi_reversion::RsiReversionStrategy;
use crate::strategy::sma_crossover::SmaCrossoverStrategy;
use crate::strategy::Strategy;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SmaCrossover,
    RsiReversion,
    MomentumBreakout,
    BankerRatchet,
}

impl StrategyType {
    pub const ALL: [StrategyType; 4] = [
        StrategyType::SmaCrossover,
        StrategyType::RsiReversion,
        StrategyType::MomentumBreakout,
        StrategyType::BankerRatchet,
    ];

    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            "rsi" | "rsi_reversion" => Some(StrategyType::RsiReversion),
            "breakout" | "momentum" | "momentum_breakout" => Some(StrategyType::MomentumBreakout),
            "ratchet" | "banker_ratchet" => Some(StrategyType::BankerRatchet),
            _ => None,
        }
    }

    //registry key
    pub fn key(&self) -> &'static str {
        match self {
            StrategyType::SmaCrossover => "sma_crossover",
            StrategyType::RsiReversion => "rsi_reversion",
            StrategyType::MomentumBreakout => "momentum_breakout",
            StrategyType::BankerRatchet => "banker_ratchet",
        }
    }

    pub fn default_params(&self) -> StrategyParams {
        match self {
            StrategyType::SmaCrossover => StrategyParams::Sma(SmaParams::default()),
            StrategyType::RsiReversion => StrategyParams::Rsi(RsiParams::default()),
            StrategyType::MomentumBreakout => StrategyParams::Breakout(BreakoutParams::default()),
            StrategyType::BankerRatchet => StrategyParams::Ratchet(RatchetParams::default()),
        }
    }
}

//sma crossover strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaParams {
    pub fast_window: usize,
    pub slow_window: usize,

    //fraction of portfolio value per entry
    pub allocation: f64,
    pub leverage: f64,
    pub allow_short: bool,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            fast_window: 20,
            slow_window: 50,
            allocation: 0.10,
            leverage: 1.0,
            allow_short: true,
        }
    }
}

//rsi mean reversion strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub exit_long: f64,
    pub exit_short: f64,
    pub deep_oversold: f64,
    pub deep_overbought: f64,
    pub trend_period: usize,
    pub volume_ma_period: usize,
    pub volume_multiplier: f64,
    pub allocation: f64,
    pub min_position_value: f64,
    pub max_position_value: f64,
    pub stop_loss_pct: f64,
    pub max_holding_days: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        RsiParams {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            exit_long: 60.0,
            exit_short: 40.0,
            deep_oversold: 20.0,
            deep_overbought: 80.0,
            trend_period: 200,
            volume_ma_period: 20,
            volume_multiplier: 1.2,
            allocation: 0.10,
            min_position_value: 1_000.0,
            max_position_value: 10_000.0,
            stop_loss_pct: 0.03,
            max_holding_days: 10,
        }
    }
}

//momentum breakout strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutParams {
    pub breakout_period: usize,
    pub breakout_pct: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    pub volume_avg_period: usize,
    pub volume_multiplier: f64,
    pub ema_exit_period: usize,
    pub atr_period: usize,
    pub chase_lookback: usize,
    pub chase_threshold: f64,
    pub profit_target_pct: f64,
    pub initial_stop_pct: f64,
    pub max_hold_days: usize,
    pub risk_amount: f64,
    pub min_position_value: f64,
    pub max_position_value: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        BreakoutParams {
            breakout_period: 20,
            breakout_pct: 0.02,
            adx_period: 14,
            adx_threshold: 25.0,
            sma_fast_period: 50,
            sma_slow_period: 200,
            volume_avg_period: 50,
            volume_multiplier: 2.0,
            ema_exit_period: 10,
            atr_period: 14,
            chase_lookback: 5,
            chase_threshold: 0.10,
            profit_target_pct: 0.15,
            initial_stop_pct: 0.05,
            max_hold_days: 30,
            risk_amount: 1_000.0,
            min_position_value: 2_000.0,
            max_position_value: 15_000.0,
        }
    }
}

//banker ratchet (liquidity grab) strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatchetParams {
    pub ema_period: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    //bollinger width below this is too quiet to trade
    pub min_bb_width: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    //bars either side of a swing high/low
    pub swing_lookback: usize,
    pub grab_tolerance: f64,
    pub poc_lookback: usize,
    pub poc_bins: usize,
    pub poc_distance: f64,
    pub atr_period: usize,

    //leverage at normal volatility, stepped down as atr/close rises
    pub base_leverage: f64,
    pub high_vol_leverage: f64,
    pub extreme_vol_leverage: f64,
    pub high_vol_atr_pct: f64,
    pub extreme_vol_atr_pct: f64,

    pub risk_pct: f64,
    pub max_exposure_pct: f64,
    pub initial_stop_pct: f64,
    pub breakeven_activation_pct: f64,
    pub trailing_distance_pct: f64,
}

impl Default for RatchetParams {
    fn default() -> Self {
        RatchetParams {
            ema_period: 200,
            bb_period: 20,
            bb_std: 2.0,
            min_bb_width: 0.02,
            rsi_period: 14,
            rsi_oversold: 45.0,
            rsi_overbought: 55.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            swing_lookback: 5,
            grab_tolerance: 0.005,
            poc_lookback: 50,
            poc_bins: 19,
            poc_distance: 0.03,
            atr_period: 14,
            base_leverage: 5.0,
            high_vol_leverage: 4.0,
            extreme_vol_leverage: 3.0,
            high_vol_atr_pct: 0.03,
            extreme_vol_atr_pct: 0.05,
            risk_pct: 0.02,
            max_exposure_pct: 0.5,
            initial_stop_pct: 0.02,
            breakeven_activation_pct: 0.02,
            trailing_distance_pct: 0.01,
        }
    }
}

//strategy-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    Sma(SmaParams),
    Rsi(RsiParams),
    Breakout(BreakoutParams),
    Ratchet(RatchetParams),
}

impl StrategyParams {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::Sma(_) => StrategyType::SmaCrossover,
            StrategyParams::Rsi(_) => StrategyType::RsiReversion,
            StrategyParams::Breakout(_) => StrategyType::MomentumBreakout,
            StrategyParams::Ratchet(_) => StrategyType::BankerRatchet,
        }
    }

    //builds a fresh strategy instance
    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            StrategyParams::Sma(p) => Box::new(SmaCrossoverStrategy::new(p.clone())),
            StrategyParams::Rsi(p) => Box::new(RsiReversionStrategy::new(p.clone())),
            StrategyParams::Breakout(p) => Box::new(MomentumBreakoutStrategy::new(p.clone())),
            StrategyParams::Ratchet(p) => Box::new(BankerRatchetStrategy::new(p.clone())),
        }
    }
}

//complete backtest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfiguration {
    //data
    pub data_path: PathBuf,
    pub symbol: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    //engine settings
    #[serde(default)]
    pub engine: BacktestConfig,

    //strategy
    pub strategy: StrategyParams,

    //optional output paths
    #[serde(default)]
    pub output_json: Option<PathBuf>,
    #[serde(default)]
    pub output_equity_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_trades_csv: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            data_path: PathBuf::from("data.csv"),
            symbol: "AAPL".to_string(),
            start_date: None,
            end_date: None,
            engine: BacktestConfig::default(),
            strategy: StrategyParams::Sma(SmaParams::default()),
            output_json: None,
            output_equity_csv: None,
            output_trades_csv: None,
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.engine.validate()?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}
