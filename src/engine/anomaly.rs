use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

//a non-fatal problem resolved to a safe default during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub day_index: usize,
    pub date: NaiveDate,
    pub symbol: String,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    //calendar distance from the previous bar exceeds the configured gap
    DataGap { calendar_days: i64 },

    //signal column holds NaN on the latest row, treated as HOLD
    UndefinedSignal,

    //signal outside {-1, 0, 1}, treated as HOLD
    InvalidSignal { value: f64 },

    //negative position size, clamped to 0
    InvalidPositionSize { size: i64 },

    //entry would need more cash than is available, not taken
    OversizedPosition {
        size: i64,
        required: f64,
        available: f64,
    },

    //leverage not finite or below 1, engine default used instead
    InvalidLeverage { value: f64 },

    //indicator frame length differs from the history, signal treated as HOLD
    DegenerateFrame { expected: usize, found: usize },
}

impl AnomalyKind {
    //true for strategy contract violations, false for data/arithmetic conditions
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, AnomalyKind::DataGap { .. })
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::DataGap { calendar_days } => {
                write!(f, "data gap of {} calendar days", calendar_days)
            }
            AnomalyKind::UndefinedSignal => write!(f, "undefined signal treated as HOLD"),
            AnomalyKind::InvalidSignal { value } => {
                write!(f, "signal {} outside {{-1, 0, 1}} treated as HOLD", value)
            }
            AnomalyKind::InvalidPositionSize { size } => {
                write!(f, "position size {} clamped to 0", size)
            }
            AnomalyKind::OversizedPosition {
                size,
                required,
                available,
            } => write!(
                f,
                "position size {} needs {:.2} but only {:.2} is available",
                size, required, available
            ),
            AnomalyKind::InvalidLeverage { value } => {
                write!(f, "leverage {} replaced by default", value)
            }
            AnomalyKind::DegenerateFrame { expected, found } => write!(
                f,
                "indicator frame has {} rows, expected {}",
                found, expected
            ),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} day {} ({}): {}",
            self.symbol, self.day_index, self.date, self.kind
        )
    }
}
