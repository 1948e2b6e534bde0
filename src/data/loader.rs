use crate::data::bar::{Bar, BarError};
use crate::data::market_data::MarketData;
use crate::error::BacktestError;
use chrono::{DateTime, NaiveDate};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read CSV file {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to parse date '{value}' at line {line}")]
    Date { value: String, line: usize },
    #[error("Invalid bar at line {line}: {source}")]
    Bar {
        line: usize,
        #[source]
        source: BarError,
    },
    #[error("No data found for symbol {0}")]
    UnknownSymbol(String),
    #[error(transparent)]
    Invalid(#[from] BacktestError),
}

//supplies ascending daily bars for one symbol over an optional date range
pub trait DataProvider: Send + Sync {
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<MarketData, DataError>;
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "timestamp")]
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    symbol: Option<String>,
}

//a bar as read from disk, with the optional symbol column
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBar {
    pub symbol: Option<String>,
    pub bar: Bar,
}

//accepts YYYY-MM-DD or rfc3339 timestamps
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|t| t.date_naive()))
}

//loads bars from a csv file, sorted by date
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LoadedBar>, DataError> {
    let path = path.as_ref();
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let record: CsvRecord = result.map_err(csv_err)?;
        let line = index + 2;

        let date = parse_date(&record.date).ok_or_else(|| DataError::Date {
            value: record.date.clone(),
            line,
        })?;

        //missing volume is kept as NaN, which validation allows
        let bar = Bar::new(
            date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume.unwrap_or(f64::NAN),
        )
        .map_err(|source| DataError::Bar { line, source })?;

        rows.push(LoadedBar {
            symbol: record.symbol.filter(|s| !s.is_empty()),
            bar,
        });
    }

    rows.sort_by(|a, b| a.bar.date.cmp(&b.bar.date));

    Ok(rows)
}

//keeps rows for the symbol; rows without a symbol column belong to every symbol
pub fn filter_by_symbol(rows: &[LoadedBar], symbol: &str) -> Vec<Bar> {
    rows.iter()
        .filter(|row| row.symbol.as_deref().map_or(true, |s| s == symbol))
        .map(|row| row.bar)
        .collect()
}

//csv file backed data provider
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    path: PathBuf,
}

impl CsvDataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvDataProvider { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for CsvDataProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<MarketData, DataError> {
        let rows = load_csv(&self.path)?;
        let bars = filter_by_symbol(&rows, symbol);

        if bars.is_empty() && !rows.is_empty() {
            return Err(DataError::UnknownSymbol(symbol.to_string()));
        }

        Ok(MarketData::new(symbol, bars)?.between(start, end))
    }
}
