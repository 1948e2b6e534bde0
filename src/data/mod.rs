pub mod bar;
pub mod loader;
pub mod market_data;

pub use bar::{Bar, BarError};
pub use loader::{filter_by_symbol, load_csv, CsvDataProvider, DataError, DataProvider, LoadedBar};
pub use market_data::MarketData;
