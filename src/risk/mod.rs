//! Portfolio risk engine. Every function here is pure: inputs are read-only
//! tables, outputs are fresh values, nothing is cached or shared.

pub mod beta;
pub mod drawdown;
pub mod stats;
pub mod weights;

/// Trading days per year, used to annualize daily statistics.
pub const TRADING_DAYS: f64 = 252.0;

pub use drawdown::portfolio_drawdown;
pub use stats::{annualized_portfolio_stats, per_ticker_stats, sector_exposure, sharpe_ratio};
pub use weights::{compute_weights, total_value, Quantities};
