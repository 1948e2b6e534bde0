#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Once;
use tradetest::prelude::*;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

//one flat bar per calendar day
pub fn market(closes: &[f64]) -> MarketData {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::flat(start_date() + chrono::Duration::days(i as i64), c, 1_000.0))
        .collect();
    MarketData::new("TEST", bars).unwrap()
}

pub fn config(commission_rate: f64) -> BacktestConfig {
    BacktestConfig {
        initial_capital: 100_000.0,
        commission_rate,
        ..BacktestConfig::default()
    }
}

pub fn run(strategy: &mut dyn Strategy, data: &MarketData, config: BacktestConfig) -> BacktestResult {
    init_logging();
    BacktestEngine::new(config).unwrap().run(strategy, data)
}

//strategy driven by a fixed script, indexed by bar position
//runs must stay shorter than max_lookback so the history always starts at bar 0
#[derive(Debug, Clone)]
pub struct Scripted {
    //signal per bar; bars past the end read `default_signal`
    pub signals: Vec<f64>,
    pub default_signal: f64,
    pub write_signal: bool,
    pub size: i64,
    pub exit_after: Option<usize>,
    pub leverage: Option<f64>,
    pub drop_last_row: bool,
    pub exit_calls: usize,
}

impl Scripted {
    pub fn always(signal: Signal, size: i64) -> Self {
        Scripted {
            signals: Vec::new(),
            default_signal: signal.value(),
            write_signal: true,
            size,
            exit_after: None,
            leverage: None,
            drop_last_row: false,
            exit_calls: 0,
        }
    }

    pub fn once(signal: Signal, size: i64) -> Self {
        Scripted {
            signals: vec![signal.value()],
            default_signal: Signal::Hold.value(),
            ..Scripted::always(Signal::Hold, size)
        }
    }

    pub fn exit_after(mut self, days: usize) -> Self {
        self.exit_after = Some(days);
        self
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = Some(leverage);
        self
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame {
        if self.drop_last_row {
            return IndicatorFrame::new(&history[..history.len().saturating_sub(1)]);
        }
        IndicatorFrame::new(history)
    }

    fn generate_signals(&self, mut frame: IndicatorFrame) -> IndicatorFrame {
        if !self.write_signal || frame.is_empty() {
            return frame;
        }
        let last = frame.len() - 1;
        let mut column = vec![Signal::Hold.value(); frame.len()];
        column[last] = self.signals.get(last).copied().unwrap_or(self.default_signal);
        frame.insert_column(SIGNAL_COLUMN, column);
        frame
    }

    fn calculate_position_size(&self, _: &str, _: f64, _: f64, _: &IndicatorFrame) -> i64 {
        self.size
    }

    fn check_exit_conditions(
        &mut self,
        _symbol: &str,
        _current_price: f64,
        _entry_price: f64,
        days_held: usize,
        _frame: &IndicatorFrame,
        _side: Side,
    ) -> bool {
        self.exit_calls += 1;
        self.exit_after.map_or(false, |n| days_held >= n)
    }

    fn get_leverage(&self, _frame: &IndicatorFrame) -> Option<f64> {
        self.leverage
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
