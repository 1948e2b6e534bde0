use crate::portfolio::position::{ExitReason, Position, Trade};
use chrono::NaiveDate;
use std::collections::HashMap;

//mutable portfolio of one engine run: cash, open positions, trade log, equity samples
#[derive(Debug, Clone)]
pub struct PortfolioState {
    //initial account balance
    pub initial_capital: f64,

    //current cash (margin is debited on entry and returned on exit)
    pub cash: f64,

    //open positions by symbol, at most one per symbol
    pub open_positions: HashMap<String, Position>,

    //closed trades in exit order
    pub trade_log: Vec<Trade>,

    //one (date, total equity) sample per simulated bar
    pub equity_curve: Vec<(NaiveDate, f64)>,

    //all commission paid so far, including on open positions
    pub total_commission: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioState {
            initial_capital,
            cash: initial_capital,
            open_positions: HashMap::new(),
            trade_log: Vec::new(),
            equity_curve: Vec::new(),
            total_commission: 0.0,
        }
    }

    //returns the position for a symbol, or none if flat
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.get(symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.open_positions.get_mut(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.open_positions.contains_key(symbol)
    }

    //cash available for margin and commission on a new entry
    pub fn buying_power(&self) -> f64 {
        self.cash
    }

    //debits margin and entry commission; refuses a second position in the same symbol
    pub fn open(&mut self, position: Position) -> bool {
        if self.has_position(&position.symbol) {
            return false;
        }

        self.cash -= position.margin() + position.entry_commission;
        self.total_commission += position.entry_commission;
        self.open_positions.insert(position.symbol.clone(), position);
        true
    }

    //closes the symbol's position at a price and logs the trade
    pub fn close(
        &mut self,
        symbol: &str,
        exit_price: f64,
        exit_date: NaiveDate,
        exit_index: usize,
        exit_commission: f64,
        reason: ExitReason,
    ) -> Option<&Trade> {
        let position = self.open_positions.remove(symbol)?;

        self.cash += position.market_value(exit_price) - exit_commission;
        self.total_commission += exit_commission;

        let trade = position.close(exit_price, exit_date, exit_index, exit_commission, reason);
        self.trade_log.push(trade);
        self.trade_log.last()
    }

    //total equity at current prices; symbols without a price are valued at entry
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let held: f64 = self
            .open_positions
            .values()
            .map(|p| {
                let price = prices.get(&p.symbol).copied().unwrap_or(p.entry_price);
                p.market_value(price)
            })
            .sum();

        self.cash + held
    }

    //appends today's equity sample and returns it
    pub fn mark_to_market(&mut self, date: NaiveDate, prices: &HashMap<String, f64>) -> f64 {
        let equity = self.equity(prices);
        self.equity_curve.push((date, equity));
        equity
    }

    //returns total unrealized pnl at given prices
    pub fn total_unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.open_positions
            .values()
            .filter_map(|p| prices.get(&p.symbol).map(|&price| p.unrealized_pnl(price)))
            .sum()
    }

    //net realized pnl across closed trades
    pub fn total_realized_pnl(&self) -> f64 {
        self.trade_log.iter().map(|t| t.realized_pnl).sum()
    }

    //realized plus unrealized pnl less the entry commission already paid on open positions;
    //equals equity - initial_capital at the same prices
    pub fn net_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        let open_commission: f64 = self
            .open_positions
            .values()
            .map(|p| p.entry_commission)
            .sum();
        self.total_realized_pnl() + self.total_unrealized_pnl(prices) - open_commission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Side;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn long_aapl(commission: f64) -> Position {
        Position::open("AAPL".to_string(), Side::Long, 100.0, day(2), 0, 10, 1.0, commission)
    }

    fn prices(price: f64) -> HashMap<String, f64> {
        HashMap::from([("AAPL".to_string(), price)])
    }

    #[test]
    fn open_debits_margin_and_commission() {
        let mut state = PortfolioState::new(10_000.0);
        assert!(state.open(long_aapl(1.0)));
        assert_eq!(state.cash, 10_000.0 - 1_000.0 - 1.0);
        assert_eq!(state.equity(&prices(100.0)), 9_999.0);
    }

    #[test]
    fn second_position_in_same_symbol_is_refused() {
        let mut state = PortfolioState::new(10_000.0);
        assert!(state.open(long_aapl(1.0)));
        let cash = state.cash;
        assert!(!state.open(long_aapl(1.0)));
        assert_eq!(state.cash, cash);
        assert_eq!(state.open_positions.len(), 1);
    }

    #[test]
    fn close_returns_margin_plus_pnl() {
        let mut state = PortfolioState::new(10_000.0);
        state.open(long_aapl(1.0));
        let trade = state
            .close("AAPL", 110.0, day(8), 4, 1.1, ExitReason::Signal)
            .cloned()
            .unwrap();

        assert!((trade.realized_pnl - 97.9).abs() < 1e-9);
        assert!((state.cash - 10_097.9).abs() < 1e-9);
        assert!((state.total_commission - 2.1).abs() < 1e-9);
        assert!(state.open_positions.is_empty());
        assert!(state.close("AAPL", 110.0, day(9), 5, 0.0, ExitReason::Signal).is_none());
    }

    #[test]
    fn mark_to_market_records_one_sample() {
        let mut state = PortfolioState::new(10_000.0);
        state.open(long_aapl(0.0));
        let equity = state.mark_to_market(day(3), &prices(105.0));
        assert_eq!(equity, 10_050.0);
        assert_eq!(state.equity_curve, vec![(day(3), 10_050.0)]);
        assert_eq!(state.total_unrealized_pnl(&prices(105.0)), 50.0);
    }

    #[test]
    fn net_pnl_matches_equity_change_while_open_and_after_close() {
        let mut state = PortfolioState::new(10_000.0);
        state.open(long_aapl(1.0));
        let open = prices(104.0);
        assert!((state.net_pnl(&open) - (state.equity(&open) - 10_000.0)).abs() < 1e-9);
        assert!((state.net_pnl(&open) - 39.0).abs() < 1e-9);

        state.close("AAPL", 110.0, day(8), 4, 1.1, ExitReason::Signal);
        assert!((state.total_realized_pnl() - 97.9).abs() < 1e-9);
        assert!((state.net_pnl(&prices(110.0)) - 97.9).abs() < 1e-9);
    }
}
