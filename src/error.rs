use chrono::NaiveDate;
use thiserror::Error;

//errors that abort a run before any simulation step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Bars out of order at index {index}: {current} does not follow {previous}")]
    UnorderedBars {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("Non-finite {field} at index {index} ({date})")]
    NonFiniteBar {
        index: usize,
        date: NaiveDate,
        field: &'static str,
    },
}

impl BacktestError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        BacktestError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
