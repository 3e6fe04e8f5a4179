use super::types::PortfolioMetrics;
use crate::errors::{EngineError, EngineResult};
use crate::market::{PriceSeries, PriceTable, ReturnSeries, SectorMap};
use crate::risk::{self, Quantities};

/// Runs the weight calculator, then the statistics engine, over data the
/// caller already fetched. Pure function.
///
/// An empty price table is a precondition failure. Every ticker in
/// `quantities` must have at least one price in `prices`.
pub fn analyze_portfolio(
    quantities: &Quantities,
    prices: &PriceTable,
    benchmark: &PriceSeries,
    sectors: &SectorMap,
) -> EngineResult<PortfolioMetrics> {
    let (Some(start_date), Some(end_date)) = (prices.start_date(), prices.end_date()) else {
        return Err(EngineError::EmptyPriceData);
    };
    if prices.is_empty() {
        return Err(EngineError::EmptyPriceData);
    }

    let last = prices.last_prices();
    let weights = risk::compute_weights(quantities, &last)?;
    let total_value = risk::total_value(quantities, &last)?;

    let (exp_return, volatility) = risk::annualized_portfolio_stats(prices, &weights)?;
    let sharpe = risk::sharpe_ratio(exp_return, volatility);
    let max_drawdown = risk::portfolio_drawdown(prices, &weights)?;

    let benchmark_returns = ReturnSeries::from_series(benchmark);
    let per_ticker = risk::per_ticker_stats(prices, &weights, &benchmark_returns, sectors);
    let sector_exposure = risk::sector_exposure(&weights, sectors);

    Ok(PortfolioMetrics {
        start_date,
        end_date,
        total_value,
        exp_return_annual: exp_return,
        volatility_annual: volatility,
        sharpe_annual: sharpe,
        max_drawdown,
        sector_exposure,
        per_ticker,
    })
}
