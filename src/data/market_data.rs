use crate::data::bar::Bar;
use crate::error::BacktestError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//ordered daily bars for one symbol, immutable once built
//safe to share read-only across concurrent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    symbol: String,
    bars: Vec<Bar>,
}

impl MarketData {
    //validates ordering and price fields before accepting the bars
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, BacktestError> {
        for (index, bar) in bars.iter().enumerate() {
            if let Some(field) = bar.non_finite_price() {
                return Err(BacktestError::NonFiniteBar {
                    index,
                    date: bar.date,
                    field,
                });
            }

            if index > 0 && bars[index - 1].date >= bar.date {
                return Err(BacktestError::UnorderedBars {
                    index,
                    previous: bars[index - 1].date,
                    current: bar.date,
                });
            }
        }

        Ok(MarketData {
            symbol: symbol.into(),
            bars,
        })
    }

    //an empty table (valid input, produces a flat result)
    pub fn empty(symbol: impl Into<String>) -> Self {
        MarketData {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    //returns (index, calendar_days) for every bar that follows a gap wider than max_gap_days
    pub fn gaps(&self, max_gap_days: i64) -> Vec<(usize, i64)> {
        self.bars
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let days = (pair[1].date - pair[0].date).num_days();
                (days > max_gap_days).then_some((i + 1, days))
            })
            .collect()
    }

    //restricts the table to an inclusive date range
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> MarketData {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.map_or(true, |s| b.date >= s))
            .filter(|b| end.map_or(true, |e| b.date <= e))
            .copied()
            .collect();

        MarketData {
            symbol: self.symbol.clone(),
            bars,
        }
    }
}
