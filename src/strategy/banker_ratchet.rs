use crate::config::RatchetParams;
use crate::data::Bar;
use crate::indicators::{math, IndicatorFrame};
use crate::portfolio::Side;
use crate::strategy::{Signal, Strategy};
use std::collections::HashMap;

const EMA_TREND: &str = "ema_trend";
const VWAP: &str = "vwap";
const BB_WIDTH: &str = "bb_width";
const RSI: &str = "rsi";
const MACD_HIST: &str = "macd_hist";
const SWING_HIGH: &str = "recent_swing_high";
const SWING_LOW: &str = "recent_swing_low";
const POC: &str = "poc";
const ATR: &str = "atr";

const NEUTRAL_RSI: f64 = 50.0;

//how far past a swing level a reversal candle may reach and still count
const REVERSAL_BAND: f64 = 0.01;

//ratchet stop for one open position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatchetStop {
    //best close since entry (highest for long, lowest for short)
    pub peak: f64,
    pub stop_price: f64,
    pub activated: bool,
}

//liquidity grab strategy for leveraged instruments
//trades a wick through a recent swing level that closes back inside, against value (vwap),
//in the direction of the long ema trend; leverage steps down as volatility rises
#[derive(Debug, Clone)]
pub struct BankerRatchetStrategy {
    params: RatchetParams,
    stops: HashMap<String, RatchetStop>,
}

impl BankerRatchetStrategy {
    pub fn new(params: RatchetParams) -> Self {
        BankerRatchetStrategy {
            params,
            stops: HashMap::new(),
        }
    }

    pub fn params(&self) -> &RatchetParams {
        &self.params
    }

    pub fn tracked_stop(&self, symbol: &str) -> Option<RatchetStop> {
        self.stops.get(symbol).copied()
    }

    //leverage tier for the current atr as a fraction of price
    pub fn leverage_for(&self, atr: f64, close: f64) -> f64 {
        let p = &self.params;
        let atr_pct = math::safe_div(atr, close);

        if atr_pct > p.extreme_vol_atr_pct {
            p.extreme_vol_leverage
        } else if atr_pct > p.high_vol_atr_pct {
            p.high_vol_leverage
        } else {
            p.base_leverage
        }
    }

    //wick into or under the swing low that closes back above it, or an up candle off it
    fn bullish_grab(&self, bar: &Bar, swing_low: f64) -> bool {
        if swing_low.is_nan() {
            return false;
        }
        let tolerance = swing_low * self.params.grab_tolerance;
        let grab = bar.low <= swing_low + tolerance && bar.close > swing_low;
        let bounce = bar.low <= swing_low * (1.0 + REVERSAL_BAND) && bar.close > bar.open;
        grab || bounce
    }

    fn bearish_grab(&self, bar: &Bar, swing_high: f64) -> bool {
        if swing_high.is_nan() {
            return false;
        }
        let tolerance = swing_high * self.params.grab_tolerance;
        let grab = bar.high >= swing_high - tolerance && bar.close < swing_high;
        let rejection = bar.high >= swing_high * (1.0 - REVERSAL_BAND) && bar.close < bar.open;
        grab || rejection
    }

    fn exit(&mut self, symbol: &str) -> bool {
        self.stops.remove(symbol);
        true
    }
}

//latest confirmed swing point per row; a swing is the extreme of the `lookback` bars
//on either side, so it is only known `lookback` bars after it prints
fn recent_swing(values: &[f64], lookback: usize, extreme: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut current = f64::NAN;

    (0..values.len())
        .map(|i| {
            if i >= 2 * lookback {
                let center = i - lookback;
                let window = &values[center - lookback..=i];
                if window.iter().copied().reduce(extreme) == Some(values[center]) {
                    current = values[center];
                }
            }
            current
        })
        .collect()
}

//volume profile point of control over the `lookback` bars before each row
//typical prices fall into `bins` equal slices of the window's range; the busiest slice wins
fn point_of_control(bars: &[Bar], lookback: usize, bins: usize) -> Vec<f64> {
    (0..bars.len())
        .map(|i| {
            if lookback == 0 || bins == 0 || i < lookback {
                return f64::NAN;
            }

            let window = &bars[i - lookback..i];
            let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let volume: f64 = window
                .iter()
                .map(|b| b.volume)
                .filter(|v| v.is_finite())
                .sum();

            let range = high - low;
            if range.is_nan() || range <= 0.0 || volume <= 0.0 {
                return window[window.len() - 1].close;
            }

            let step = range / bins as f64;
            let mut profile = vec![0.0; bins];
            for bar in window.iter().filter(|b| b.volume.is_finite()) {
                let typical = (bar.high + bar.low + bar.close) / 3.0;
                let slot = (((typical - low) / step).floor().max(0.0) as usize).min(bins - 1);
                profile[slot] += bar.volume;
            }

            let (busiest, _) = profile.iter().enumerate().fold(
                (0, f64::NEG_INFINITY),
                |best, (slot, &v)| if v > best.1 { (slot, v) } else { best },
            );

            low + step * (busiest as f64 + 0.5)
        })
        .collect()
}

impl Strategy for BankerRatchetStrategy {
    fn name(&self) -> &str {
        "Banker Ratchet"
    }

    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame {
        let p = &self.params;
        let frame = IndicatorFrame::new(history);
        let (highs, lows, closes, volumes) =
            (frame.highs(), frame.lows(), frame.closes(), frame.volumes());

        //bollinger width: (upper - lower) / middle
        let middle = math::sma(&closes, p.bb_period);
        let band: Vec<f64> = math::rolling_std(&closes, p.bb_period)
            .into_iter()
            .map(|sd| 2.0 * p.bb_std * sd)
            .collect();

        let fast = math::ema(&closes, p.macd_fast);
        let slow = math::ema(&closes, p.macd_slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = math::ema(&macd, p.macd_signal);
        let hist: Vec<f64> = macd.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

        let rsi: Vec<f64> = math::wilder_rsi(&closes, p.rsi_period)
            .into_iter()
            .map(|v| if v.is_nan() { NEUTRAL_RSI } else { v })
            .collect();

        frame
            .with_column(EMA_TREND, math::ema(&closes, p.ema_period))
            .with_column(VWAP, math::vwap(&highs, &lows, &closes, &volumes))
            .with_column(BB_WIDTH, math::ratio(&band, &middle))
            .with_column(RSI, rsi)
            .with_column(MACD_HIST, hist)
            .with_column(SWING_HIGH, recent_swing(&highs, p.swing_lookback, f64::max))
            .with_column(SWING_LOW, recent_swing(&lows, p.swing_lookback, f64::min))
            .with_column(POC, point_of_control(history, p.poc_lookback, p.poc_bins))
            .with_column(ATR, math::atr(&highs, &lows, &closes, p.atr_period))
    }

    fn generate_signals(&self, mut frame: IndicatorFrame) -> IndicatorFrame {
        let (last, bar) = match (frame.len().checked_sub(1), frame.last_bar()) {
            (Some(last), Some(bar)) => (last, *bar),
            _ => return frame,
        };

        let p = &self.params;
        let close = bar.close;
        let trend = frame.latest(EMA_TREND);
        let value = frame.latest(VWAP);
        let rsi = frame.latest(RSI);
        let hist = frame.latest(MACD_HIST);
        let prev_hist = frame.previous(MACD_HIST);

        let poc = frame.latest(POC);
        let near_poc = poc.is_nan() || (close - poc).abs() / close < p.poc_distance;

        //quiet bands or undefined trend/value leave the signal at hold
        let energetic = frame.latest(BB_WIDTH) >= p.min_bb_width;
        let defined = !trend.is_nan() && !value.is_nan();

        let signal = if !(energetic && defined && near_poc) {
            Signal::Hold
        } else if close > trend
            && self.bullish_grab(&bar, frame.latest(SWING_LOW))
            && close < value
            && rsi < p.rsi_oversold
            && hist > prev_hist
        {
            Signal::Buy
        } else if close < trend
            && self.bearish_grab(&bar, frame.latest(SWING_HIGH))
            && close > value
            && rsi > p.rsi_overbought
            && hist < prev_hist
        {
            Signal::Sell
        } else {
            Signal::Hold
        };

        frame.set_signal(last, signal);
        frame
    }

    //risk a fixed share of the portfolio against the initial stop, capped by leveraged exposure
    fn calculate_position_size(
        &self,
        _symbol: &str,
        price: f64,
        portfolio_value: f64,
        frame: &IndicatorFrame,
    ) -> i64 {
        let p = &self.params;
        if price.is_nan() || price <= 0.0 || portfolio_value.is_nan() || portfolio_value <= 0.0 {
            return 0;
        }

        let stop_distance = price * p.initial_stop_pct;
        if stop_distance.is_nan() || stop_distance <= 0.0 {
            return 0;
        }

        let leverage = self.get_leverage(frame).unwrap_or(p.base_leverage);
        let contracts = (portfolio_value * p.risk_pct / stop_distance).floor() as i64;
        let max_contracts = (portfolio_value * p.max_exposure_pct * leverage / price).floor() as i64;

        contracts.min(max_contracts)
    }

    //fixed stop from entry until the position is up by the activation level,
    //then a stop trailing the best close that only ever tightens
    fn check_exit_conditions(
        &mut self,
        symbol: &str,
        current_price: f64,
        entry_price: f64,
        days_held: usize,
        _frame: &IndicatorFrame,
        side: Side,
    ) -> bool {
        if entry_price <= 0.0 || current_price <= 0.0 {
            return self.exit(symbol);
        }

        let (initial_stop, activation, trail) = (
            self.params.initial_stop_pct,
            self.params.breakeven_activation_pct,
            self.params.trailing_distance_pct,
        );

        //first check after an entry starts a fresh stop
        if days_held <= 1 {
            self.stops.remove(symbol);
        }

        let sign = side.sign() as f64;
        let stop = self.stops.entry(symbol.to_string()).or_insert(RatchetStop {
            peak: entry_price,
            stop_price: entry_price * (1.0 - sign * initial_stop),
            activated: false,
        });

        let profit_pct = sign * (current_price - entry_price) / entry_price;
        stop.peak = match side {
            Side::Long => stop.peak.max(current_price),
            Side::Short => stop.peak.min(current_price),
        };

        if profit_pct >= activation {
            stop.activated = true;
        }
        if stop.activated {
            stop.stop_price = stop.peak * (1.0 - sign * trail);
        }

        let hit = match side {
            Side::Long => current_price <= stop.stop_price,
            Side::Short => current_price >= stop.stop_price,
        };

        if hit {
            self.exit(symbol)
        } else {
            false
        }
    }

    //5x normally, 4x above 3% atr/close, 3x above 5%
    fn get_leverage(&self, frame: &IndicatorFrame) -> Option<f64> {
        let close = frame.last_bar().map(|b| b.close).unwrap_or(f64::NAN);
        Some(self.leverage_for(frame.latest(ATR), close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn ohlc(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new_unchecked(day(i), open, high, low, close, 1_000.0)
    }

    fn atr_frame(atr: f64) -> IndicatorFrame {
        IndicatorFrame::new(&[Bar::flat(day(0), 100.0, 1_000.0)]).with_column(ATR, vec![atr])
    }

    //two-row frame with every column the signal rule reads
    fn setup_frame(last: Bar, columns: &[(&str, [f64; 2])]) -> IndicatorFrame {
        let bars = [ohlc(0, 100.0, 101.0, 99.0, 100.0), last];
        columns
            .iter()
            .fold(IndicatorFrame::new(&bars), |frame, (name, values)| {
                frame.with_column(*name, values.to_vec())
            })
    }

    fn bullish_columns(width: f64, hist_now: f64) -> Vec<(&'static str, [f64; 2])> {
        vec![
            (EMA_TREND, [90.0, 90.0]),
            (VWAP, [105.0, 105.0]),
            (BB_WIDTH, [width, width]),
            (RSI, [40.0, 40.0]),
            (MACD_HIST, [-1.0, hist_now]),
            (SWING_LOW, [95.5, 95.5]),
            (POC, [f64::NAN, 100.0]),
        ]
    }

    #[test]
    fn leverage_steps_down_with_volatility() {
        let strategy = BankerRatchetStrategy::new(RatchetParams::default());
        assert_eq!(strategy.get_leverage(&atr_frame(2.0)), Some(5.0));
        assert_eq!(strategy.get_leverage(&atr_frame(3.0)), Some(5.0));
        assert_eq!(strategy.get_leverage(&atr_frame(4.0)), Some(4.0));
        assert_eq!(strategy.get_leverage(&atr_frame(6.0)), Some(3.0));
        assert_eq!(strategy.get_leverage(&atr_frame(f64::NAN)), Some(5.0));
    }

    #[test]
    fn sizing_risks_a_fixed_share_capped_by_exposure() {
        let strategy = BankerRatchetStrategy::new(RatchetParams::default());
        //2000 risk over a 2.00 stop distance
        assert_eq!(strategy.calculate_position_size("X", 100.0, 100_000.0, &atr_frame(2.0)), 1_000);

        let aggressive = BankerRatchetStrategy::new(RatchetParams {
            risk_pct: 0.2,
            ..RatchetParams::default()
        });
        //half the portfolio at 5x, then at 3x
        assert_eq!(aggressive.calculate_position_size("X", 100.0, 100_000.0, &atr_frame(2.0)), 2_500);
        assert_eq!(aggressive.calculate_position_size("X", 100.0, 100_000.0, &atr_frame(6.0)), 1_500);
        assert_eq!(strategy.calculate_position_size("X", 0.0, 100_000.0, &atr_frame(2.0)), 0);
    }

    #[test]
    fn bullish_liquidity_grab_buys() {
        let strategy = BankerRatchetStrategy::new(RatchetParams::default());
        let last = ohlc(1, 100.0, 102.0, 95.0, 101.0);

        let frame = strategy.generate_signals(setup_frame(last, &bullish_columns(0.05, -0.5)));
        assert_eq!(frame.latest_signal_value(), 1.0);

        //quiet bands
        let frame = strategy.generate_signals(setup_frame(last, &bullish_columns(0.01, -0.5)));
        assert_eq!(frame.latest_signal_value(), 0.0);

        //momentum still falling
        let frame = strategy.generate_signals(setup_frame(last, &bullish_columns(0.05, -1.5)));
        assert_eq!(frame.latest_signal_value(), 0.0);
    }

    #[test]
    fn bearish_liquidity_grab_sells() {
        let strategy = BankerRatchetStrategy::new(RatchetParams::default());
        let last = ohlc(1, 100.0, 105.0, 98.0, 99.0);
        let columns = [
            (EMA_TREND, [110.0, 110.0]),
            (VWAP, [95.0, 95.0]),
            (BB_WIDTH, [0.05, 0.05]),
            (RSI, [60.0, 60.0]),
            (MACD_HIST, [1.0, 0.5]),
            (SWING_HIGH, [104.8, 104.8]),
            (POC, [f64::NAN, f64::NAN]),
        ];

        let frame = strategy.generate_signals(setup_frame(last, &columns));
        assert_eq!(frame.latest_signal_value(), -1.0);
    }

    #[test]
    fn short_history_holds_with_matching_length() {
        let strategy = BankerRatchetStrategy::new(RatchetParams::default());
        let bars = [ohlc(0, 100.0, 101.0, 99.0, 100.0), ohlc(1, 100.0, 103.0, 99.0, 102.0)];
        let frame = strategy.generate_signals(strategy.calculate_indicators(&bars));
        assert_eq!(frame.len(), 2);
        assert!(frame.has_column(POC));
        assert_eq!(frame.latest_signal_value(), 0.0);
    }

    #[test]
    fn long_stop_ratchets_behind_the_peak() {
        let mut strategy = BankerRatchetStrategy::new(RatchetParams::default());
        let frame = atr_frame(1.0);

        //fixed 2% stop before activation
        assert!(!strategy.check_exit_conditions("X", 99.0, 100.0, 1, &frame, Side::Long));
        assert!(strategy.check_exit_conditions("X", 97.9, 100.0, 2, &frame, Side::Long));
        assert_eq!(strategy.tracked_stop("X"), None);

        //3% up activates a 1% trail under the best close
        assert!(!strategy.check_exit_conditions("X", 103.0, 100.0, 1, &frame, Side::Long));
        assert!(!strategy.check_exit_conditions("X", 105.0, 100.0, 2, &frame, Side::Long));
        let stop = strategy.tracked_stop("X").unwrap();
        assert!(stop.activated);
        assert!((stop.stop_price - 103.95).abs() < 1e-9);

        assert!(strategy.check_exit_conditions("X", 103.9, 100.0, 3, &frame, Side::Long));
    }

    #[test]
    fn short_stop_mirrors_the_long_side() {
        let mut strategy = BankerRatchetStrategy::new(RatchetParams::default());
        let frame = atr_frame(1.0);

        assert!(!strategy.check_exit_conditions("X", 101.0, 100.0, 1, &frame, Side::Short));
        assert!(strategy.check_exit_conditions("X", 102.5, 100.0, 2, &frame, Side::Short));

        assert!(!strategy.check_exit_conditions("X", 97.0, 100.0, 1, &frame, Side::Short));
        assert!(strategy.check_exit_conditions("X", 98.0, 100.0, 2, &frame, Side::Short));

        assert!(strategy.check_exit_conditions("X", 0.0, 100.0, 1, &frame, Side::Short));
    }

    #[test]
    fn swings_are_confirmed_after_the_lookback() {
        let values = [1.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0];

        let highs = recent_swing(&values, 1, f64::max);
        assert!(highs[1].is_nan());
        assert_eq!(&highs[2..], &[3.0; 5]);

        let lows = recent_swing(&values, 1, f64::min);
        assert!(lows[4].is_nan());
        assert_eq!(lows[5], 0.0);
        assert_eq!(lows[6], 0.0);
    }

    #[test]
    fn point_of_control_follows_volume() {
        let bars: Vec<Bar> = [(10.0, 1.0), (20.0, 5.0), (20.0, 5.0), (15.0, 1.0)]
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| Bar::flat(day(i as i64), close, volume))
            .collect();

        let poc = point_of_control(&bars, 3, 2);
        assert!(poc[2].is_nan());
        assert!((poc[3] - 17.5).abs() < 1e-9);

        let flat: Vec<Bar> = (0..3).map(|i| Bar::flat(day(i), 10.0, 1.0)).collect();
        assert_eq!(point_of_control(&flat, 2, 2)[2], 10.0);
    }
}
