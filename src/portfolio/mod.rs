pub mod analyze;
pub mod types;

pub use analyze::analyze_portfolio;
pub use types::{PortfolioMetrics, PortfolioRequest};
