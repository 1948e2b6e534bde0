use crate::data::{Bar, MarketData};
use crate::engine::anomaly::{Anomaly, AnomalyKind};
use crate::engine::execution::ExecutionModel;
use crate::engine::risk::RiskPolicy;
use crate::error::BacktestError;
use crate::indicators::{IndicatorFrame, SIGNAL_COLUMN};
use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
use crate::portfolio::{ExitReason, PortfolioState, Position, Side, Trade};
use crate::strategy::{Signal, Strategy};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//result of a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: SummaryMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub anomalies: Vec<Anomaly>,
}

//configuration for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,

    //fraction of notional charged on entry and on exit
    pub commission_rate: f64,

    //leverage used when the strategy does not supply one
    pub default_leverage: f64,

    //bars of history handed to the strategy each day
    //indicators restart inside this window, so recursive ones (ema, wilder) settle
    //only when it is several times their period
    pub max_lookback: usize,

    pub stop_loss_pct: Option<f64>,
    pub trailing_stop_pct: Option<f64>,

    //calendar days between bars above which a data gap is recorded
    pub max_gap_days: i64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            default_leverage: 1.0,
            max_lookback: 500,
            stop_loss_pct: None,
            trailing_stop_pct: None,
            max_gap_days: 5,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::config(
                "initial_capital",
                format!("must be finite and > 0, got {}", self.initial_capital),
            ));
        }

        if !self.commission_rate.is_finite() || self.commission_rate < 0.0 {
            return Err(BacktestError::config(
                "commission_rate",
                format!("must be finite and >= 0, got {}", self.commission_rate),
            ));
        }

        if !self.default_leverage.is_finite() || self.default_leverage < 1.0 {
            return Err(BacktestError::config(
                "default_leverage",
                format!("must be finite and >= 1, got {}", self.default_leverage),
            ));
        }

        if self.max_lookback == 0 {
            return Err(BacktestError::config("max_lookback", "must be at least 1"));
        }

        if self.max_gap_days < 1 {
            return Err(BacktestError::config(
                "max_gap_days",
                format!("must be at least 1, got {}", self.max_gap_days),
            ));
        }

        for (field, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if let Some(pct) = value {
                if !(pct > 0.0 && pct < 1.0) {
                    return Err(BacktestError::config(
                        field,
                        format!("must be in (0, 1), got {}", pct),
                    ));
                }
            }
        }

        Ok(())
    }

    //applies DEFAULT_INITIAL_CAPITAL and DEFAULT_COMMISSION from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    //unparseable values are ignored
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

        if let Some(capital) = parse("DEFAULT_INITIAL_CAPITAL") {
            self.initial_capital = capital;
        }
        if let Some(rate) = parse("DEFAULT_COMMISSION") {
            self.commission_rate = rate;
        }
        self
    }
}

//main backtest engine
//single-threaded; one run owns its portfolio state exclusively
pub struct BacktestEngine {
    config: BacktestConfig,
    execution: ExecutionModel,
    risk: RiskPolicy,
    portfolio: PortfolioState,
    anomalies: Vec<Anomaly>,
    days_in_market: usize,
}

impl BacktestEngine {
    //creates a new backtest engine, rejecting invalid configuration
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;

        Ok(BacktestEngine {
            execution: ExecutionModel::new(config.commission_rate),
            risk: RiskPolicy::new(config.stop_loss_pct, config.trailing_stop_pct),
            portfolio: PortfolioState::new(config.initial_capital),
            anomalies: Vec::new(),
            days_in_market: 0,
            config,
        })
    }

    //runs the backtest over one symbol's bars; state from any earlier run is discarded
    pub fn run(&mut self, strategy: &mut dyn Strategy, data: &MarketData) -> BacktestResult {
        self.portfolio = PortfolioState::new(self.config.initial_capital);
        self.anomalies.clear();
        self.days_in_market = 0;

        let symbol = data.symbol();
        let bars = data.bars();
        let gaps: HashMap<usize, i64> = data.gaps(self.config.max_gap_days).into_iter().collect();
        let mut prices: HashMap<String, f64> = HashMap::new();

        //main backtest loop
        for (i, bar) in bars.iter().enumerate() {
            if let Some(&calendar_days) = gaps.get(&i) {
                self.record(i, bar.date, symbol, AnomalyKind::DataGap { calendar_days });
            }

            prices.insert(symbol.to_string(), bar.close);

            //1. indicator refresh over the rolling history ending today
            let start = (i + 1).saturating_sub(self.config.max_lookback);
            let history = &bars[start..=i];
            let frame = strategy.calculate_indicators(history);
            let degenerate = frame.len() != history.len();
            let frame = if degenerate {
                self.record(
                    i,
                    bar.date,
                    symbol,
                    AnomalyKind::DegenerateFrame {
                        expected: history.len(),
                        found: frame.len(),
                    },
                );
                frame
            } else {
                strategy.generate_signals(frame)
            };

            //2. exits
            let exited = self.process_exit(strategy, symbol, bar, i, &frame);

            //3. entries, never on the day a position in the symbol was closed
            //nor on the final bar, where the position could only be force-closed at once
            let final_bar = i + 1 == bars.len();
            if !exited && !degenerate && !final_bar && !self.portfolio.has_position(symbol) {
                self.process_entry(strategy, symbol, bar, i, &frame, &prices);
            }

            //4. mark to market
            if self.portfolio.has_position(symbol) {
                self.days_in_market += 1;
            }
            self.portfolio.mark_to_market(bar.date, &prices);
        }

        //force-close at the final bar and restate the final equity sample
        if let Some((last_index, last_bar)) = bars.iter().enumerate().last() {
            if self.portfolio.has_position(symbol) {
                self.close_position(symbol, last_bar, last_index, ExitReason::EndOfData);

                let equity = self.portfolio.equity(&prices);
                if let Some(last) = self.portfolio.equity_curve.last_mut() {
                    last.1 = equity;
                }
            }
        }

        let result = self.build_result(strategy.name(), data);

        info!(
            "{} on {}: {} bars, {} trades, net pnl {:.2}, final equity {:.2}, {} anomalies",
            result.strategy_name,
            result.symbol,
            bars.len(),
            result.summary.num_trades,
            self.portfolio.net_pnl(&prices),
            result.summary.final_equity,
            result.anomalies.len()
        );

        result
    }

    //returns true when the open position was closed today
    fn process_exit(
        &mut self,
        strategy: &mut dyn Strategy,
        symbol: &str,
        bar: &Bar,
        index: usize,
        frame: &IndicatorFrame,
    ) -> bool {
        let reason = match self.portfolio.position_mut(symbol) {
            Some(position) => {
                position.update_best_price(bar.close);

                //hard stops are evaluated before the strategy's own exit rule
                self.risk.check(position, bar.close).or_else(|| {
                    strategy
                        .check_exit_conditions(
                            symbol,
                            bar.close,
                            position.entry_price,
                            position.days_held(index),
                            frame,
                            position.side,
                        )
                        .then_some(ExitReason::Signal)
                })
            }
            None => None,
        };

        match reason {
            Some(reason) => {
                self.close_position(symbol, bar, index, reason);
                true
            }
            None => false,
        }
    }

    fn process_entry(
        &mut self,
        strategy: &mut dyn Strategy,
        symbol: &str,
        bar: &Bar,
        index: usize,
        frame: &IndicatorFrame,
        prices: &HashMap<String, f64>,
    ) {
        let side = match self.read_signal(symbol, bar.date, index, frame) {
            Some(side) => side,
            None => return,
        };

        let leverage = match strategy.get_leverage(frame) {
            None => self.config.default_leverage,
            Some(value) if value.is_finite() && value >= 1.0 => value,
            Some(value) => {
                self.record(index, bar.date, symbol, AnomalyKind::InvalidLeverage { value });
                self.config.default_leverage
            }
        };

        let portfolio_value = self.portfolio.equity(prices);
        let size = strategy.calculate_position_size(symbol, bar.close, portfolio_value, frame);

        if size < 0 {
            self.record(index, bar.date, symbol, AnomalyKind::InvalidPositionSize { size });
            return;
        }
        if size == 0 {
            return;
        }

        let cost = self.execution.entry_cost(bar.close, size, leverage);
        let available = self.portfolio.buying_power();

        if !cost.required().is_finite() || cost.required() > available {
            self.record(
                index,
                bar.date,
                symbol,
                AnomalyKind::OversizedPosition {
                    size,
                    required: cost.required(),
                    available,
                },
            );
            return;
        }

        let position = Position::open(
            symbol.to_string(),
            side,
            bar.close,
            bar.date,
            index,
            size,
            leverage,
            cost.commission,
        );

        debug!(
            "{} {} open {} {} @ {:.4} x{} (commission {:.4})",
            bar.date, symbol, side, size, bar.close, leverage, cost.commission
        );

        self.portfolio.open(position);
    }

    //decodes today's signal into an entry side; anything undefined is HOLD
    fn read_signal(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        index: usize,
        frame: &IndicatorFrame,
    ) -> Option<Side> {
        //a strategy that never writes a signal column simply holds
        if !frame.has_column(SIGNAL_COLUMN) {
            return None;
        }

        let value = frame.latest_signal_value();
        match Signal::from_value(value) {
            Some(signal) => signal.entry_side(),
            None => {
                let kind = if value.is_nan() {
                    AnomalyKind::UndefinedSignal
                } else {
                    AnomalyKind::InvalidSignal { value }
                };
                self.record(index, date, symbol, kind);
                None
            }
        }
    }

    fn close_position(&mut self, symbol: &str, bar: &Bar, index: usize, reason: ExitReason) {
        let quantity = match self.portfolio.position(symbol) {
            Some(position) => position.quantity(),
            None => return,
        };
        let commission = self.execution.commission(bar.close, quantity);

        if let Some(trade) =
            self.portfolio
                .close(symbol, bar.close, bar.date, index, commission, reason)
        {
            debug!(
                "{} {} close {} {} @ {:.4} ({:?}) pnl {:.2}",
                bar.date,
                symbol,
                trade.side,
                trade.size,
                trade.exit_price,
                trade.exit_reason,
                trade.realized_pnl
            );
        }
    }

    fn record(&mut self, day_index: usize, date: NaiveDate, symbol: &str, kind: AnomalyKind) {
        let anomaly = Anomaly {
            day_index,
            date,
            symbol: symbol.to_string(),
            kind,
        };
        warn!("{}", anomaly);
        self.anomalies.push(anomaly);
    }

    fn build_result(&self, strategy_name: &str, data: &MarketData) -> BacktestResult {
        let equity_curve = calculate_equity_curve(&self.portfolio.equity_curve);
        let trades = self.portfolio.trade_log.clone();

        let summary = SummaryMetrics::from_backtest(
            &equity_curve,
            &trades,
            self.config.initial_capital,
            self.portfolio.total_commission,
            self.days_in_market,
        );

        BacktestResult {
            strategy_name: strategy_name.to_string(),
            symbol: data.symbol().to_string(),
            start_date: data.first_date(),
            end_date: data.last_date(),
            summary,
            trades,
            equity_curve,
            anomalies: self.anomalies.clone(),
        }
    }

    //returns a reference to the portfolio of the last run
    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }
}
