use crate::data::Bar;
use crate::strategy::Signal;
use indexmap::IndexMap;

pub const SIGNAL_COLUMN: &str = "signal";

//bar history augmented with strategy-computed indicator columns
//owned by one simulation step; every column has exactly one value per bar
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,
    columns: IndexMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    //copies the history so the caller's bars are never touched
    pub fn new(history: &[Bar]) -> Self {
        IndicatorFrame {
            bars: history.to_vec(),
            columns: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    //inserts or replaces a column, padding with NaN (or truncating) to the frame length
    pub fn insert_column(&mut self, name: impl Into<String>, mut values: Vec<f64>) {
        values.resize(self.bars.len(), f64::NAN);
        self.columns.insert(name.into(), values);
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert_column(name, values);
        self
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    //value at a row, NaN when the column or row does not exist
    pub fn value_at(&self, name: &str, index: usize) -> f64 {
        self.column(name)
            .and_then(|c| c.get(index).copied())
            .unwrap_or(f64::NAN)
    }

    //value on the latest row, NaN when undefined
    pub fn latest(&self, name: &str) -> f64 {
        match self.bars.len() {
            0 => f64::NAN,
            n => self.value_at(name, n - 1),
        }
    }

    //value on the row before the latest, NaN when undefined
    pub fn previous(&self, name: &str) -> f64 {
        match self.bars.len() {
            0 | 1 => f64::NAN,
            n => self.value_at(name, n - 2),
        }
    }

    //writes a signal on one row, creating a HOLD column on first use
    pub fn set_signal(&mut self, index: usize, signal: Signal) {
        let len = self.bars.len();
        let column = self
            .columns
            .entry(SIGNAL_COLUMN.to_string())
            .or_insert_with(|| vec![Signal::Hold.value(); len]);
        if let Some(slot) = column.get_mut(index) {
            *slot = signal.value();
        }
    }

    //raw signal value on the latest row; NaN when no signal column exists
    pub fn latest_signal_value(&self) -> f64 {
        self.latest(SIGNAL_COLUMN)
    }
}
