//fills happen at the day's close; commission is a flat fraction of notional on each side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionModel {
    commission_rate: f64,
}

//cash needed to open a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryCost {
    //notional / leverage, returned to cash on exit
    pub margin: f64,
    pub commission: f64,
}

impl EntryCost {
    pub fn required(&self) -> f64 {
        self.margin + self.commission
    }
}

impl ExecutionModel {
    pub fn new(commission_rate: f64) -> Self {
        ExecutionModel { commission_rate }
    }

    //returns the notional value of a fill
    pub fn notional(&self, price: f64, quantity: i64) -> f64 {
        price * quantity.unsigned_abs() as f64
    }

    pub fn commission(&self, price: f64, quantity: i64) -> f64 {
        self.notional(price, quantity) * self.commission_rate
    }

    pub fn entry_cost(&self, price: f64, quantity: i64, leverage: f64) -> EntryCost {
        EntryCost {
            margin: self.notional(price, quantity) / leverage,
            commission: self.commission(price, quantity),
        }
    }
}
