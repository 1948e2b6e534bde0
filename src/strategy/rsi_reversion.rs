use crate::config::RsiParams;
use crate::data::Bar;
use crate::indicators::{math, IndicatorFrame};
use crate::portfolio::Side;
use crate::strategy::{allocation_shares, Signal, Strategy};

const RSI: &str = "rsi";
const TREND: &str = "sma_trend";
const VOLUME_MA: &str = "volume_ma";
const HIGH_VOLUME: &str = "high_volume";

//undefined rsi (warmup or no losses in the window) reads as neutral
const NEUTRAL_RSI: f64 = 50.0;

//rsi mean reversion strategy
//buys oversold dips above the long trend average, sells overbought rallies below it
//entries need above-average volume
#[derive(Debug, Clone)]
pub struct RsiReversionStrategy {
    params: RsiParams,
}

impl RsiReversionStrategy {
    pub fn new(params: RsiParams) -> Self {
        RsiReversionStrategy { params }
    }

    pub fn params(&self) -> &RsiParams {
        &self.params
    }
}

impl Strategy for RsiReversionStrategy {
    fn name(&self) -> &str {
        "RSI Mean Reversion"
    }

    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame {
        let frame = IndicatorFrame::new(history);
        let closes = frame.closes();
        let volumes = frame.volumes();

        let rsi: Vec<f64> = math::wilder_rsi(&closes, self.params.rsi_period)
            .into_iter()
            .map(|v| if v.is_nan() { NEUTRAL_RSI } else { v })
            .collect();

        let volume_ma = math::sma(&volumes, self.params.volume_ma_period);
        let high_volume: Vec<f64> = volumes
            .iter()
            .zip(&volume_ma)
            .map(|(&v, &ma)| {
                if v >= self.params.volume_multiplier * ma {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();

        frame
            .with_column(RSI, rsi)
            .with_column(TREND, math::sma(&closes, self.params.trend_period))
            .with_column(VOLUME_MA, volume_ma)
            .with_column(HIGH_VOLUME, high_volume)
    }

    fn generate_signals(&self, mut frame: IndicatorFrame) -> IndicatorFrame {
        let last = match frame.len().checked_sub(1) {
            Some(last) => last,
            None => return frame,
        };

        let close = frame.last_bar().map(|b| b.close).unwrap_or(f64::NAN);
        let rsi = frame.latest(RSI);
        let trend = frame.latest(TREND);
        let high_volume = frame.latest(HIGH_VOLUME) == 1.0;

        let signal = if !trend.is_finite() || !high_volume {
            Signal::Hold
        } else if rsi < self.params.oversold && close > trend {
            Signal::Buy
        } else if rsi > self.params.overbought && close < trend {
            Signal::Sell
        } else {
            Signal::Hold
        };

        frame.set_signal(last, signal);
        frame
    }

    //allocation of portfolio value, clamped to the min/max position value
    fn calculate_position_size(
        &self,
        _symbol: &str,
        price: f64,
        portfolio_value: f64,
        _frame: &IndicatorFrame,
    ) -> i64 {
        allocation_shares(
            price,
            portfolio_value,
            self.params.allocation,
            self.params.min_position_value,
            self.params.max_position_value,
        )
    }

    fn check_exit_conditions(
        &mut self,
        _symbol: &str,
        current_price: f64,
        entry_price: f64,
        days_held: usize,
        frame: &IndicatorFrame,
        side: Side,
    ) -> bool {
        if entry_price <= 0.0 || current_price <= 0.0 {
            return true;
        }

        if days_held >= self.params.max_holding_days {
            return true;
        }

        let rsi = frame.latest(RSI);
        if rsi.is_nan() {
            return false;
        }

        let p = &self.params;
        match side {
            //profit target, deeper oversold, or percentage stop
            Side::Long => {
                rsi > p.exit_long
                    || rsi < p.deep_oversold
                    || current_price <= entry_price * (1.0 - p.stop_loss_pct)
            }
            Side::Short => {
                rsi < p.exit_short
                    || rsi > p.deep_overbought
                    || current_price >= entry_price * (1.0 + p.stop_loss_pct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Bar::flat(start + chrono::Duration::days(i as i64), c, v))
            .collect()
    }

    fn fast_params() -> RsiParams {
        RsiParams {
            rsi_period: 3,
            trend_period: 14,
            volume_ma_period: 3,
            ..RsiParams::default()
        }
    }

    //steady rally from 100 to 200, then a three-day pullback that stays above the trend average
    fn pullback_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..=10).map(|i| 100.0 + 10.0 * i as f64).collect();
        closes.extend([185.0, 172.0, 165.0]);
        closes
    }

    #[test]
    fn oversold_pullback_in_uptrend_with_volume_buys() {
        let strategy = RsiReversionStrategy::new(fast_params());
        let closes = pullback_closes();
        let mut volumes = vec![1_000.0; closes.len()];
        *volumes.last_mut().unwrap() = 2_000.0;

        let frame = strategy.generate_signals(strategy.calculate_indicators(&bars(&closes, &volumes)));
        assert!(frame.latest(RSI) < 30.0);
        assert!(frame.latest(TREND) < 165.0);
        assert_eq!(frame.latest_signal_value(), 1.0);
    }

    #[test]
    fn ordinary_volume_blocks_the_entry() {
        let strategy = RsiReversionStrategy::new(fast_params());
        let closes = pullback_closes();
        let volumes = vec![1_000.0; closes.len()];

        let frame = strategy.generate_signals(strategy.calculate_indicators(&bars(&closes, &volumes)));
        assert_eq!(frame.latest_signal_value(), 0.0);
    }

    #[test]
    fn trend_warmup_holds() {
        let strategy = RsiReversionStrategy::new(RsiParams::default());
        let closes = pullback_closes();
        let mut volumes = vec![1_000.0; closes.len()];
        *volumes.last_mut().unwrap() = 5_000.0;

        let frame = strategy.generate_signals(strategy.calculate_indicators(&bars(&closes, &volumes)));
        assert_eq!(frame.len(), closes.len());
        assert_eq!(frame.latest_signal_value(), 0.0);
    }

    #[test]
    fn flat_prices_read_neutral_rsi() {
        let strategy = RsiReversionStrategy::new(fast_params());
        let frame = strategy.calculate_indicators(&bars(&[100.0; 8], &[1_000.0; 8]));
        assert_eq!(frame.latest(RSI), NEUTRAL_RSI);
    }

    #[test]
    fn exits_on_time_stop_and_rsi() {
        let mut strategy = RsiReversionStrategy::new(fast_params());
        let frame = strategy.calculate_indicators(&bars(&[100.0; 8], &[1_000.0; 8]));

        assert!(!strategy.check_exit_conditions("AAPL", 100.0, 100.0, 1, &frame, Side::Long));
        assert!(strategy.check_exit_conditions("AAPL", 100.0, 100.0, 10, &frame, Side::Long));
        assert!(strategy.check_exit_conditions("AAPL", 96.9, 100.0, 1, &frame, Side::Long));
        assert!(strategy.check_exit_conditions("AAPL", 103.1, 100.0, 1, &frame, Side::Short));
        assert!(!strategy.check_exit_conditions("AAPL", 96.9, 100.0, 1, &frame, Side::Short));

        //rallying frame pushes rsi above the long exit level
        let rally = strategy.calculate_indicators(&bars(
            &[100.0, 99.0, 101.0, 104.0, 108.0, 113.0],
            &[1_000.0; 6],
        ));
        assert!(rally.latest(RSI) > 60.0);
        assert!(strategy.check_exit_conditions("AAPL", 113.0, 110.0, 2, &rally, Side::Long));
    }

    #[test]
    fn position_value_stays_inside_band() {
        let strategy = RsiReversionStrategy::new(RsiParams::default());
        let frame = IndicatorFrame::new(&bars(&[50.0], &[1.0]));
        //10% of 1m capped at 10k
        assert_eq!(strategy.calculate_position_size("AAPL", 50.0, 1_000_000.0, &frame), 200);
        //10% of 5k raised to 1k
        assert_eq!(strategy.calculate_position_size("AAPL", 50.0, 5_000.0, &frame), 20);
        assert_eq!(strategy.calculate_position_size("AAPL", 0.0, 5_000.0, &frame), 0);
    }
}
