use super::weights::{weight_vector, WeightMap};
use crate::errors::EngineResult;
use crate::market::{PriceTable, ReturnSeries};

/// Maximum drawdown of a return series, as a non-positive fraction.
///
/// Growth is compounded from an initial value of 1.0 and compared against
/// its running peak; the result is the most negative `growth / peak - 1`.
/// A series that never loses returns 0.0. An empty series has no defined
/// drawdown and returns NaN.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }

    let mut growth = 1.0;
    let mut peak: f64 = 1.0;
    let mut worst: f64 = 0.0;

    for r in returns {
        growth *= 1.0 + r;
        peak = peak.max(growth);
        worst = worst.min(growth / peak - 1.0);
    }

    worst
}

/// Weighted daily return of the whole portfolio.
/// Only dates where every ticker has a return contribute.
pub fn portfolio_returns(table: &PriceTable, weights: &WeightMap) -> EngineResult<ReturnSeries> {
    let w = weight_vector(table, weights)?;
    let aligned = table.aligned_returns();

    let values = aligned
        .rows
        .iter()
        .map(|row| row.iter().zip(&w).map(|(r, wi)| r * wi).sum())
        .collect();

    Ok(ReturnSeries {
        dates: aligned.dates,
        values,
    })
}

/// Drawdown of the weighted portfolio return series.
pub fn portfolio_drawdown(table: &PriceTable, weights: &WeightMap) -> EngineResult<f64> {
    Ok(max_drawdown(&portfolio_returns(table, weights)?.values))
}
