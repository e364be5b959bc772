pub mod drawdown;
pub mod error;
pub mod lots;
pub mod sharpe;
pub mod var;

pub use drawdown::DrawdownTracker;
pub use error::RiskError;
pub use lots::{FifoMatcher, RealizedTrade};
pub use sharpe::SharpeRatio;
pub use var::{historical_es, historical_var};
