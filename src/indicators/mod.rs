pub mod frame;
pub mod math;

pub use frame::{IndicatorFrame, SIGNAL_COLUMN};
