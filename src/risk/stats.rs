use super::beta::simple_beta;
use super::drawdown::max_drawdown;
use super::weights::{weight_vector, WeightMap};
use super::TRADING_DAYS;
use crate::errors::EngineResult;
use crate::market::{sector_of, PriceTable, ReturnSeries, SectorMap};
use crate::portfolio::types::TickerMetric;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Return over volatility. 0.0 whenever volatility is exactly zero,
/// whatever the sign of the return.
#[inline]
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64) -> f64 {
    if annual_volatility == 0.0 {
        0.0
    } else {
        annual_return / annual_volatility
    }
}

/// Annualized expected return and volatility of the weighted portfolio.
///
/// Daily returns of all columns are inner-joined on date, then
/// `E = w . mu * 252` and `vol = sqrt(w' Sigma w * 252)` with the sample
/// covariance matrix. Fewer than two aligned rows leave both undefined (NaN).
pub fn annualized_portfolio_stats(
    table: &PriceTable,
    weights: &WeightMap,
) -> EngineResult<(f64, f64)> {
    let w = weight_vector(table, weights)?;
    let columns = table.aligned_returns().columns(w.len());

    let mu: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().mean() * TRADING_DAYS)
        .collect();
    let expected_return: f64 = w.iter().zip(&mu).map(|(wi, m)| wi * m).sum();

    let mut variance = 0.0;
    for (i, ci) in columns.iter().enumerate() {
        for (j, cj) in columns.iter().enumerate().skip(i) {
            let cov = ci.iter().covariance(cj.iter()) * TRADING_DAYS;
            let term = w[i] * w[j] * cov;
            variance += if i == j { term } else { 2.0 * term };
        }
    }

    // Rounding can push a zero-variance portfolio slightly negative.
    let volatility = if variance.is_nan() {
        f64::NAN
    } else {
        variance.max(0.0).sqrt()
    };

    Ok((expected_return, volatility))
}

/// Per-ticker statistics on each column's own full return history.
/// Records follow the price table's column order.
pub fn per_ticker_stats(
    table: &PriceTable,
    weights: &WeightMap,
    benchmark: &ReturnSeries,
    sectors: &SectorMap,
) -> Vec<TickerMetric> {
    table
        .tickers()
        .iter()
        .enumerate()
        .map(|(idx, ticker)| {
            let returns = table.returns(idx);
            let mean_return = returns.values.iter().mean() * TRADING_DAYS;
            let volatility = returns.values.iter().std_dev() * TRADING_DAYS.sqrt();
            let beta = simple_beta(&returns, benchmark);

            TickerMetric {
                ticker: ticker.clone(),
                weight: weights.get(ticker).copied().unwrap_or(0.0),
                mean_return,
                volatility,
                sharpe: sharpe_ratio(mean_return, volatility),
                beta: beta.is_finite().then_some(beta),
                max_drawdown: max_drawdown(&returns.values),
                sector: sector_of(sectors, ticker).to_string(),
            }
        })
        .collect()
}

/// Portfolio weight aggregated by sector label.
pub fn sector_exposure(weights: &WeightMap, sectors: &SectorMap) -> BTreeMap<String, f64> {
    let mut exposure: BTreeMap<String, f64> = BTreeMap::new();
    for (ticker, w) in weights {
        *exposure
            .entry(sector_of(sectors, ticker).to_string())
            .or_insert(0.0) += w;
    }
    exposure
}
