pub mod banker_ratchet;
pub mod momentum_breakout;
pub mod registry;
pub mod rsi_reversion;
pub mod sma_crossover;

use crate::data::Bar;
use crate::indicators::IndicatorFrame;
use crate::portfolio::Side;
use serde::{Deserialize, Serialize};

//per-day trade intent for the latest row of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    //numeric encoding used in the signal column (1, -1, 0)
    pub fn value(self) -> f64 {
        match self {
            Signal::Buy => 1.0,
            Signal::Sell => -1.0,
            Signal::Hold => 0.0,
        }
    }

    //decodes a column value; anything outside {-1, 0, 1} is None
    pub fn from_value(value: f64) -> Option<Self> {
        if value == 1.0 {
            Some(Signal::Buy)
        } else if value == -1.0 {
            Some(Signal::Sell)
        } else if value == 0.0 {
            Some(Signal::Hold)
        } else {
            None
        }
    }

    //side of the position an entry on this signal opens
    pub fn entry_side(self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Long),
            Signal::Sell => Some(Side::Short),
            Signal::Hold => None,
        }
    }
}

//strategy interface that all strategies must implement
//the engine calls these once per bar, in order: indicators, signals, exits, sizing
pub trait Strategy: Send {
    //returns the strategy name
    fn name(&self) -> &str;

    //adds indicator columns to a copy of the history; undefined values are NaN
    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame;

    //writes the signal for the latest row using only rows up to it
    fn generate_signals(&self, frame: IndicatorFrame) -> IndicatorFrame;

    //shares to trade; 0 when inputs are degenerate
    fn calculate_position_size(
        &self,
        symbol: &str,
        price: f64,
        portfolio_value: f64,
        frame: &IndicatorFrame,
    ) -> i64;

    //true to close the open position at today's close
    //mutable so strategies can keep per-symbol trackers
    fn check_exit_conditions(
        &mut self,
        symbol: &str,
        current_price: f64,
        entry_price: f64,
        days_held: usize,
        frame: &IndicatorFrame,
        side: Side,
    ) -> bool;

    //leverage for a new entry; None falls back to the engine default
    fn get_leverage(&self, _frame: &IndicatorFrame) -> Option<f64> {
        None
    }
}

//shares affordable with `allocation` of the portfolio, clamped to a position value band
//returns 0 when price or portfolio value is not positive
pub fn allocation_shares(
    price: f64,
    portfolio_value: f64,
    allocation: f64,
    min_value: f64,
    max_value: f64,
) -> i64 {
    if price.is_nan() || price <= 0.0 || portfolio_value.is_nan() || portfolio_value <= 0.0 {
        return 0;
    }

    let value = (portfolio_value * allocation).clamp(min_value, max_value.max(min_value));
    (value / price).floor() as i64
}
