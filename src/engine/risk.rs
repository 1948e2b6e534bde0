use crate::portfolio::{ExitReason, Position, Side};

//engine-level hard stops, checked on the close before the strategy's own exit rule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskPolicy {
    //max adverse move from entry, as a fraction
    pub stop_loss_pct: Option<f64>,

    //max retracement from the best close since entry, as a fraction
    pub trailing_stop_pct: Option<f64>,
}

impl RiskPolicy {
    pub fn new(stop_loss_pct: Option<f64>, trailing_stop_pct: Option<f64>) -> Self {
        RiskPolicy {
            stop_loss_pct,
            trailing_stop_pct,
        }
    }

    //stop loss wins over trailing stop when both are breached
    pub fn check(&self, position: &Position, price: f64) -> Option<ExitReason> {
        if let Some(pct) = self.stop_loss_pct {
            if breached(position.side, position.entry_price, pct, price) {
                return Some(ExitReason::StopLoss);
            }
        }

        if let Some(pct) = self.trailing_stop_pct {
            if breached(position.side, position.best_price, pct, price) {
                return Some(ExitReason::TrailingStop);
            }
        }

        None
    }
}

fn breached(side: Side, reference: f64, pct: f64, price: f64) -> bool {
    match side {
        Side::Long => price <= reference * (1.0 - pct),
        Side::Short => price >= reference * (1.0 + pct),
    }
}
