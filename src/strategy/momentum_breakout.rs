use crate::config::BreakoutParams;
use crate::data::Bar;
use crate::indicators::{math, IndicatorFrame};
use crate::portfolio::Side;
use crate::strategy::{Signal, Strategy};
use std::collections::HashMap;

const HIGH_N: &str = "breakout_high";
const SMA_FAST: &str = "sma_fast";
const SMA_SLOW: &str = "sma_slow";
const VOLUME_AVG: &str = "volume_avg";
const VOLUME_RATIO: &str = "volume_ratio";
const ATR: &str = "atr";
const ADX: &str = "adx";
const EMA_EXIT: &str = "ema_exit";
const PRICE_CHANGE: &str = "price_change";

//profit levels where the stop moves to breakeven and then starts trailing
const BREAKEVEN_AT: f64 = 0.05;
const TRAIL_AT: f64 = 0.10;

//momentum breakout strategy (long only)
//buys a close above the prior n-day high in a strong, aligned trend on heavy volume
#[derive(Debug, Clone)]
pub struct MomentumBreakoutStrategy {
    params: BreakoutParams,

    //highest close since entry, per symbol
    highest_since_entry: HashMap<String, f64>,
}

impl MomentumBreakoutStrategy {
    pub fn new(params: BreakoutParams) -> Self {
        MomentumBreakoutStrategy {
            params,
            highest_since_entry: HashMap::new(),
        }
    }

    pub fn params(&self) -> &BreakoutParams {
        &self.params
    }

    pub fn tracked_high(&self, symbol: &str) -> Option<f64> {
        self.highest_since_entry.get(symbol).copied()
    }

    //tiered stop: fixed below entry, then breakeven, then trailing off the high
    fn stop_price(&self, entry_price: f64, highest: f64, profit_pct: f64, atr: f64) -> f64 {
        if profit_pct < BREAKEVEN_AT {
            entry_price * (1.0 - self.params.initial_stop_pct)
        } else if profit_pct < TRAIL_AT {
            entry_price
        } else if atr.is_finite() {
            highest - 2.0 * atr
        } else {
            highest * 0.95
        }
    }

    fn exit(&mut self, symbol: &str) -> bool {
        self.highest_since_entry.remove(symbol);
        true
    }
}

impl Strategy for MomentumBreakoutStrategy {
    fn name(&self) -> &str {
        "Momentum Breakout"
    }

    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame {
        let p = &self.params;
        let frame = IndicatorFrame::new(history);
        let (highs, lows, closes, volumes) =
            (frame.highs(), frame.lows(), frame.closes(), frame.volumes());

        let volume_avg = math::sma(&volumes, p.volume_avg_period);
        let volume_ratio = math::ratio(&volumes, &volume_avg);

        frame
            .with_column(HIGH_N, math::rolling_max(&highs, p.breakout_period))
            .with_column(SMA_FAST, math::sma(&closes, p.sma_fast_period))
            .with_column(SMA_SLOW, math::sma(&closes, p.sma_slow_period))
            .with_column(VOLUME_AVG, volume_avg)
            .with_column(VOLUME_RATIO, volume_ratio)
            .with_column(ATR, math::atr(&highs, &lows, &closes, p.atr_period))
            .with_column(ADX, math::adx(&highs, &lows, &closes, p.adx_period))
            .with_column(EMA_EXIT, math::ema(&closes, p.ema_exit_period))
            .with_column(PRICE_CHANGE, math::pct_change(&closes, p.chase_lookback))
    }

    fn generate_signals(&self, mut frame: IndicatorFrame) -> IndicatorFrame {
        let last = match frame.len().checked_sub(1) {
            Some(last) => last,
            None => return frame,
        };

        let p = &self.params;
        let close = frame.last_bar().map(|b| b.close).unwrap_or(f64::NAN);

        //undefined inputs compare false and leave the signal at hold
        let breakout = close > frame.previous(HIGH_N) * (1.0 + p.breakout_pct);
        let strong_trend = frame.latest(ADX) > p.adx_threshold;
        let above_averages = close > frame.latest(SMA_FAST) && close > frame.latest(SMA_SLOW);
        let heavy_volume = frame.latest(VOLUME_RATIO) >= p.volume_multiplier;
        let not_chasing = frame.latest(PRICE_CHANGE).abs() <= p.chase_threshold;

        let signal = if breakout && strong_trend && above_averages && heavy_volume && not_chasing {
            Signal::Buy
        } else {
            Signal::Hold
        };

        frame.set_signal(last, signal);
        frame
    }

    //risk amount over two atr, clamped to the position value band
    fn calculate_position_size(
        &self,
        _symbol: &str,
        price: f64,
        _portfolio_value: f64,
        frame: &IndicatorFrame,
    ) -> i64 {
        let p = &self.params;
        if price.is_nan() || price <= 0.0 || frame.is_empty() {
            return 0;
        }

        let atr = frame.latest(ATR);
        if atr.is_nan() || atr <= 0.0 {
            return (p.min_position_value / price).floor() as i64;
        }

        let mut shares = (p.risk_amount / (2.0 * atr)).floor() as i64;
        let value = shares as f64 * price;
        if value < p.min_position_value {
            shares = (p.min_position_value / price).floor() as i64;
        } else if value > p.max_position_value {
            shares = (p.max_position_value / price).floor() as i64;
        }

        shares.max(1)
    }

    fn check_exit_conditions(
        &mut self,
        symbol: &str,
        current_price: f64,
        entry_price: f64,
        days_held: usize,
        frame: &IndicatorFrame,
        side: Side,
    ) -> bool {
        if frame.is_empty() || side != Side::Long || entry_price <= 0.0 {
            return false;
        }

        //first check after an entry starts a fresh tracker
        if days_held <= 1 {
            self.highest_since_entry.insert(symbol.to_string(), entry_price);
        }
        let highest = self
            .highest_since_entry
            .entry(symbol.to_string())
            .or_insert(entry_price);
        *highest = highest.max(current_price);
        let highest = *highest;

        let profit_pct = (current_price - entry_price) / entry_price;

        if profit_pct >= self.params.profit_target_pct || days_held > self.params.max_hold_days {
            return self.exit(symbol);
        }

        let ema = frame.latest(EMA_EXIT);
        if !ema.is_nan() && current_price < ema {
            return self.exit(symbol);
        }

        let stop = self.stop_price(entry_price, highest, profit_pct, frame.latest(ATR));
        if current_price < stop {
            return self.exit(symbol);
        }

        false
    }
}
