use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

//direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    //converts to quantity sign (Long = +1, Short = -1)
    pub fn sign(self) -> i64 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

//why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    //strategy check_exit_conditions returned true
    Signal,
    //engine hard stop from entry price
    StopLoss,
    //engine trailing stop from the best close since entry
    TrailingStop,
    //force-closed on the last bar
    EndOfData,
}

//an open position in one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_date: NaiveDate,

    //bar index of the entry, days_held counts bars from here
    pub entry_index: usize,

    //signed quantity (positive for long, negative for short)
    pub size: i64,

    pub leverage: f64,

    //commission charged when the position was opened
    pub entry_commission: f64,

    //best close since entry (highest for long, lowest for short)
    pub best_price: f64,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: String,
        side: Side,
        entry_price: f64,
        entry_date: NaiveDate,
        entry_index: usize,
        quantity: i64,
        leverage: f64,
        entry_commission: f64,
    ) -> Self {
        Position {
            symbol,
            side,
            entry_price,
            entry_date,
            entry_index,
            size: quantity.abs() * side.sign(),
            leverage,
            entry_commission,
            best_price: entry_price,
        }
    }

    //unsigned number of shares
    pub fn quantity(&self) -> i64 {
        self.size.abs()
    }

    //cash committed at entry (notional / leverage)
    pub fn margin(&self) -> f64 {
        self.entry_price * self.quantity() as f64 / self.leverage
    }

    //leveraged p&l at a price, before commissions
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.size as f64 * self.leverage
    }

    //margin plus unrealized p&l, what closing now would return to cash before commission
    pub fn market_value(&self, current_price: f64) -> f64 {
        self.margin() + self.unrealized_pnl(current_price)
    }

    pub fn days_held(&self, current_index: usize) -> usize {
        current_index.saturating_sub(self.entry_index)
    }

    //tracks the most favourable close for trailing stops
    pub fn update_best_price(&mut self, price: f64) {
        self.best_price = match self.side {
            Side::Long => self.best_price.max(price),
            Side::Short => self.best_price.min(price),
        };
    }

    //closes the position into an immutable trade record
    pub fn close(
        self,
        exit_price: f64,
        exit_date: NaiveDate,
        exit_index: usize,
        exit_commission: f64,
        exit_reason: ExitReason,
    ) -> Trade {
        let gross_pnl = self.unrealized_pnl(exit_price);
        let commission_paid = self.entry_commission + exit_commission;
        let realized_pnl = gross_pnl - commission_paid;
        let margin = self.margin();

        Trade {
            return_pct: if margin > 0.0 { realized_pnl / margin } else { 0.0 },
            days_held: self.days_held(exit_index),
            size: self.quantity(),
            symbol: self.symbol,
            side: self.side,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
            leverage: self.leverage,
            commission_paid,
            gross_pnl,
            realized_pnl,
            exit_reason,
        }
    }
}

//closed-position record, immutable once logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    //unsigned quantity, direction is in `side`
    pub size: i64,
    pub leverage: f64,

    //entry plus exit commission
    pub commission_paid: f64,

    //leveraged price p&l before commissions
    pub gross_pnl: f64,

    //gross_pnl - commission_paid
    pub realized_pnl: f64,

    //realized_pnl relative to the margin committed
    pub return_pct: f64,

    //bars between entry and exit
    pub days_held: usize,
    pub exit_reason: ExitReason,
}

impl Trade {
    //true when the trade was closed by the end of the data, not by a rule
    pub fn is_forced(&self) -> bool {
        self.exit_reason == ExitReason::EndOfData
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.realized_pnl < 0.0
    }
}
