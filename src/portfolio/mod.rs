pub mod position;
pub mod state;

pub use position::{ExitReason, Position, Side, Trade};
pub use state::PortfolioState;
