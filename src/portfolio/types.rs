use crate::errors::{EngineError, EngineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// serde_json writes non-finite floats as null; read them back as NaN.
fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn default_currency() -> String {
    "USD".to_string()
}

// ── Request ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub quantity: f64,
    #[serde(default)]
    pub buy_price: Option<f64>,
}

impl Holding {
    pub fn validate(&self) -> EngineResult<()> {
        if !is_valid_ticker(&self.ticker) {
            return Err(EngineError::InvalidHolding(format!(
                "ticker {:?} must contain a letter and use only A-Z, '.' and '-'",
                self.ticker
            )));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(EngineError::InvalidHolding(format!(
                "{}: quantity must be positive",
                self.ticker
            )));
        }
        if let Some(p) = self.buy_price {
            if !(p.is_finite() && p > 0.0) {
                return Err(EngineError::InvalidHolding(format!(
                    "{}: buy_price must be positive",
                    self.ticker
                )));
            }
        }
        Ok(())
    }
}

/// Uppercase symbol charset, e.g. AAPL, BRK.B, RDS-A. At least one letter,
/// so a symbol can never be a bare `.` or `..` path segment.
pub fn is_valid_ticker(ticker: &str) -> bool {
    ticker.chars().any(|c| c.is_ascii_uppercase())
        && ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '.' || c == '-')
}

/// Ticker charset plus an optional leading `^` for indices such as ^GSPC.
pub fn is_valid_benchmark(symbol: &str) -> bool {
    is_valid_ticker(symbol.strip_prefix('^').unwrap_or(symbol))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRequest {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub benchmark: Option<String>,
    pub holdings: Vec<Holding>,
}

impl PortfolioRequest {
    /// Validates every holding and merges repeated tickers by summing quantities.
    pub fn quantities(&self) -> EngineResult<BTreeMap<String, f64>> {
        if self.holdings.is_empty() {
            return Err(EngineError::InvalidHolding("portfolio has no holdings".into()));
        }

        let mut qty = BTreeMap::new();
        for h in &self.holdings {
            h.validate()?;
            *qty.entry(h.ticker.clone()).or_insert(0.0) += h.quantity;
        }
        Ok(qty)
    }

    /// Requested benchmark, uppercased, or `default` when absent or blank.
    /// The symbol ends up in a provider URL path, so it must pass the
    /// benchmark charset.
    pub fn benchmark_symbol(&self, default: &str) -> EngineResult<String> {
        let symbol = self
            .benchmark
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(default)
            .to_uppercase();

        if !is_valid_benchmark(&symbol) {
            return Err(EngineError::InvalidBenchmark(symbol));
        }
        Ok(symbol)
    }
}

// ── Response ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerMetric {
    pub ticker: String,
    #[serde(deserialize_with = "nan_if_null")]
    pub weight: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub mean_return: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub volatility: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub sharpe: f64,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(deserialize_with = "nan_if_null")]
    pub max_drawdown: f64,
    pub sector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioMetrics {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(deserialize_with = "nan_if_null")]
    pub total_value: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub exp_return_annual: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub volatility_annual: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub sharpe_annual: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub max_drawdown: f64,
    pub sector_exposure: BTreeMap<String, f64>,
    pub per_ticker: Vec<TickerMetric>,
}
