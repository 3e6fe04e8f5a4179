pub mod table;
pub mod types;
pub mod yahoo;

use crate::errors::EngineResult;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;

pub use table::{PriceSeries, PriceTable, ReturnSeries};

/// Label used whenever a ticker's sector cannot be determined.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Ticker -> sector label.
pub type SectorMap = BTreeMap<String, String>;

/// Sector label for `ticker`, falling back to "Unknown".
pub fn sector_of<'a>(sectors: &'a SectorMap, ticker: &str) -> &'a str {
    sectors
        .get(ticker)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_SECTOR)
}

/// Folds independent per-ticker lookups into a SectorMap.
/// A failed or empty lookup degrades to "Unknown" for that ticker only.
pub fn resolve_sectors(lookups: Vec<(String, EngineResult<Option<String>>)>) -> SectorMap {
    lookups
        .into_iter()
        .map(|(ticker, lookup)| {
            let sector = match lookup {
                Ok(Some(s)) if !s.trim().is_empty() => s,
                Ok(_) => UNKNOWN_SECTOR.to_string(),
                Err(e) => {
                    tracing::warn!(ticker = %ticker, error = %e, "sector lookup failed");
                    UNKNOWN_SECTOR.to_string()
                }
            };
            (ticker, sector)
        })
        .collect()
}

/// Supplier of price history and sector labels.
/// Send + Sync required so one instance can serve concurrent requests.
pub trait MarketData: Send + Sync {
    /// Adjusted closes for `tickers` over the last `years`. May be empty.
    fn fetch_prices<'a>(
        &'a self,
        tickers: &'a [String],
        years: u32,
    ) -> BoxFuture<'a, EngineResult<PriceTable>>;

    /// Adjusted closes for one benchmark symbol.
    fn fetch_benchmark<'a>(
        &'a self,
        symbol: &'a str,
        years: u32,
    ) -> BoxFuture<'a, EngineResult<PriceSeries>>;

    /// Best-effort sector lookup. Never fails as a whole.
    fn fetch_sectors<'a>(&'a self, tickers: &'a [String]) -> BoxFuture<'a, SectorMap>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    #[test]
    fn test_resolve_sectors_isolates_failures() {
        let sectors = resolve_sectors(vec![
            ("AAPL".into(), Ok(Some("Technology".into()))),
            ("XOM".into(), Err(EngineError::Network("timeout".into()))),
            ("SPY".into(), Ok(None)),
            ("BRK.B".into(), Ok(Some("  ".into()))),
        ]);

        assert_eq!(sectors.len(), 4);
        assert_eq!(sectors["AAPL"], "Technology");
        assert_eq!(sectors["XOM"], UNKNOWN_SECTOR);
        assert_eq!(sectors["SPY"], UNKNOWN_SECTOR);
        assert_eq!(sectors["BRK.B"], UNKNOWN_SECTOR);
    }

    #[test]
    fn test_sector_of_defaults_to_unknown() {
        let sectors = SectorMap::new();
        assert_eq!(sector_of(&sectors, "MSFT"), UNKNOWN_SECTOR);
    }
}
