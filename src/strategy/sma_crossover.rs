use crate::config::SmaParams;
use crate::data::Bar;
use crate::indicators::{math, IndicatorFrame};
use crate::portfolio::Side;
use crate::strategy::{allocation_shares, Signal, Strategy};

const FAST: &str = "sma_fast";
const SLOW: &str = "sma_slow";

//sma crossover strategy
//goes long when fast sma crosses above slow sma
//goes short when fast sma crosses below slow sma
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    params: SmaParams,
}

impl SmaCrossoverStrategy {
    pub fn new(params: SmaParams) -> Self {
        SmaCrossoverStrategy { params }
    }

    pub fn params(&self) -> &SmaParams {
        &self.params
    }

    //checks the latest two rows for a crossover
    //returns buy for bullish crossover, sell for bearish, hold otherwise
    fn check_crossover(&self, frame: &IndicatorFrame) -> Signal {
        let (fast, slow) = (frame.latest(FAST), frame.latest(SLOW));
        let (prev_fast, prev_slow) = (frame.previous(FAST), frame.previous(SLOW));

        //nan comparisons are false, so warmup rows never cross
        if prev_fast <= prev_slow && fast > slow {
            Signal::Buy
        } else if prev_fast >= prev_slow && fast < slow && self.params.allow_short {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn calculate_indicators(&self, history: &[Bar]) -> IndicatorFrame {
        let frame = IndicatorFrame::new(history);
        let closes = frame.closes();

        frame
            .with_column(FAST, math::sma(&closes, self.params.fast_window))
            .with_column(SLOW, math::sma(&closes, self.params.slow_window))
    }

    fn generate_signals(&self, mut frame: IndicatorFrame) -> IndicatorFrame {
        if let Some(last) = frame.len().checked_sub(1) {
            let signal = self.check_crossover(&frame);
            frame.set_signal(last, signal);
        }
        frame
    }

    fn calculate_position_size(
        &self,
        _symbol: &str,
        price: f64,
        portfolio_value: f64,
        _frame: &IndicatorFrame,
    ) -> i64 {
        allocation_shares(price, portfolio_value, self.params.allocation, 0.0, f64::INFINITY)
    }

    //exits once the averages have flipped against the position
    fn check_exit_conditions(
        &mut self,
        _symbol: &str,
        _current_price: f64,
        _entry_price: f64,
        _days_held: usize,
        frame: &IndicatorFrame,
        side: Side,
    ) -> bool {
        let (fast, slow) = (frame.latest(FAST), frame.latest(SLOW));
        match side {
            Side::Long => fast < slow,
            Side::Short => fast > slow,
        }
    }

    fn get_leverage(&self, _frame: &IndicatorFrame) -> Option<f64> {
        Some(self.params.leverage)
    }
}
