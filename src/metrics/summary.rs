use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use crate::portfolio::Trade;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

//deviations below this are floating-point noise on a flat curve
const MIN_DEVIATION: f64 = 1e-12;

//summary metrics for a backtest
//every ratio resolves to 0 when its denominator is zero or undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,

    //fraction of initial capital
    pub total_return_pct: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub num_trades: usize,
    pub num_winning: usize,
    pub num_losing: usize,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub total_commission: f64,
    pub num_forced_exits: usize,

    //fraction of simulated days with an open position
    pub exposure: f64,
}

impl SummaryMetrics {
    //calculate summary metrics from equity curve and trade log
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
        total_commission: f64,
        days_in_market: usize,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = final_equity - initial_capital;
        let total_return_pct = total_return / initial_capital;

        let cagr = calculate_cagr(equity_curve, initial_capital, final_equity);

        let (max_dd, max_dd_pct) = max_drawdown(equity_curve);

        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = calculate_returns(&equity_values);

        let trade_stats = calculate_trade_statistics(trades);

        let exposure = if equity_curve.is_empty() {
            0.0
        } else {
            days_in_market as f64 / equity_curve.len() as f64
        };

        SummaryMetrics {
            initial_capital,
            final_equity,
            total_return,
            total_return_pct,
            cagr,
            max_drawdown: max_dd,
            max_drawdown_pct: max_dd_pct,
            sharpe_ratio: calculate_sharpe_ratio(&returns),
            sortino_ratio: calculate_sortino_ratio(&returns),
            num_trades: trade_stats.num_trades,
            num_winning: trade_stats.num_winning,
            num_losing: trade_stats.num_losing,
            win_rate: trade_stats.win_rate,
            average_win: trade_stats.average_win,
            average_loss: trade_stats.average_loss,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            profit_factor: trade_stats.profit_factor,
            total_commission,
            num_forced_exits: trades.iter().filter(|t| t.is_forced()).count(),
            exposure,
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        self.to_table().printstd();
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();

        let rows = [
            ("Metric", "Value".to_string()),
            ("Initial Capital", format!("${:.2}", self.initial_capital)),
            ("Final Equity", format!("${:.2}", self.final_equity)),
            (
                "Total Return",
                format!(
                    "${:.2} ({:.2}%)",
                    self.total_return,
                    self.total_return_pct * 100.0
                ),
            ),
            ("CAGR", format!("{:.2}%", self.cagr * 100.0)),
            (
                "Max Drawdown",
                format!(
                    "${:.2} ({:.2}%)",
                    self.max_drawdown,
                    self.max_drawdown_pct * 100.0
                ),
            ),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Number of Trades", self.num_trades.to_string()),
            ("Winning Trades", self.num_winning.to_string()),
            ("Losing Trades", self.num_losing.to_string()),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.average_win)),
            ("Avg Loss", format!("${:.2}", self.average_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Commission", format!("${:.2}", self.total_commission)),
            ("Forced Exits", self.num_forced_exits.to_string()),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        for (label, value) in rows {
            table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
        }

        table
    }
}

struct TradeStats {
    num_trades: usize,
    num_winning: usize,
    num_losing: usize,
    win_rate: f64,
    average_win: f64,
    average_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

fn calculate_trade_statistics(trades: &[Trade]) -> TradeStats {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.realized_pnl)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.realized_pnl)
        .collect();

    let num_trades = trades.len();

    let win_rate = if num_trades > 0 {
        wins.len() as f64 / num_trades as f64
    } else {
        0.0
    };

    let total_wins: f64 = wins.iter().sum();
    let total_losses: f64 = losses.iter().sum::<f64>().abs();

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else {
        0.0
    };

    TradeStats {
        num_trades,
        num_winning: wins.len(),
        num_losing: losses.len(),
        win_rate,
        average_win: mean_or_zero(&wins),
        average_loss: mean_or_zero(&losses),
        profit_factor,
        largest_win: wins.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losses.iter().fold(0.0f64, |a, &b| a.min(b)),
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.mean()
    }
}

//mean / sample stdev of daily returns, annualized by sqrt(252)
pub fn calculate_sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if std_dev <= MIN_DEVIATION || !std_dev.is_finite() {
        return 0.0;
    }

    finite_or_zero(mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt())
}

//like sharpe, but only downside returns contribute to the deviation
pub fn calculate_sortino_ratio(returns: &[f64]) -> f64 {
    let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();

    if returns.is_empty() || negative_returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let downside_dev = negative_returns.std_dev();

    if downside_dev <= MIN_DEVIATION || !downside_dev.is_finite() {
        return 0.0;
    }

    finite_or_zero(mean / downside_dev * TRADING_DAYS_PER_YEAR.sqrt())
}

fn calculate_cagr(equity_curve: &[EquityPoint], initial_capital: f64, final_equity: f64) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };

    let years = (last.date - first.date).num_days() as f64 / 365.25;
    if years <= 0.0 || final_equity <= 0.0 {
        return 0.0;
    }

    finite_or_zero((final_equity / initial_capital).powf(1.0 / years) - 1.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
