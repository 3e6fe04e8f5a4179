use super::table::PriceSeries;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;

// ── Chart (price history) ──

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartBody {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub description: Option<String>,
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("error"),
            self.description.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

impl ChartResult {
    /// Daily adjusted closes keyed by trading date. Falls back to the raw
    /// close when no adjusted series is present. A repeated date keeps the
    /// later observation.
    pub fn into_series(self) -> PriceSeries {
        let closes = match self.indicators.adjclose.into_iter().next() {
            Some(adj) if !adj.adjclose.is_empty() => adj.adjclose,
            _ => self
                .indicators
                .quote
                .into_iter()
                .next()
                .map(|q| q.close)
                .unwrap_or_default(),
        };

        let mut by_date: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
        for (ts, close) in self.timestamp.iter().zip(closes) {
            let Some(date) = DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()) else {
                continue;
            };
            let close = close.filter(|p| p.is_finite() && *p >= 0.0);
            let keep_existing = close.is_none() && matches!(by_date.get(&date), Some(Some(_)));
            if !keep_existing {
                by_date.insert(date, close);
            }
        }

        let (dates, prices) = by_date.into_iter().unzip();
        PriceSeries::new(dates, prices)
    }
}

/// Error envelope Yahoo sends with 4xx answers, e.g. a missing crumb.
#[derive(Debug, Clone, Deserialize)]
pub struct FinanceErrorResponse {
    pub finance: FinanceErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinanceErrorBody {
    pub error: Option<ApiErrorBody>,
}

/// "code: description" for a finance error envelope, the raw body otherwise.
pub fn error_detail(body: String) -> String {
    match serde_json::from_str::<FinanceErrorResponse>(&body) {
        Ok(FinanceErrorResponse {
            finance: FinanceErrorBody { error: Some(err) },
        }) => err.to_string(),
        _ => body,
    }
}

// ── Quote summary (asset profile) ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    pub quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSummaryBody {
    pub result: Option<Vec<QuoteSummaryResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    pub asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetProfile {
    pub sector: Option<String>,
}

impl QuoteSummaryResponse {
    pub fn sector(self) -> Option<String> {
        self.quote_summary
            .result?
            .into_iter()
            .next()?
            .asset_profile?
            .sector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_prefers_adjclose() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL"},
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {
                        "quote": [{"close": [185.64, 184.25, 181.91]}],
                        "adjclose": [{"adjclose": [184.29, 182.91, null]}]
                    }
                }],
                "error": null
            }
        }"#;

        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let series = resp.chart.result.unwrap().remove(0).into_series();

        assert_eq!(series.dates.len(), 3);
        assert_eq!(series.dates[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series.prices[0], Some(184.29));
        assert_eq!(series.prices[2], None);
    }

    #[test]
    fn test_chart_falls_back_to_close() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704205800],
                    "indicators": {"quote": [{"close": [470.5]}]}
                }],
                "error": null
            }
        }"#;

        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let series = resp.chart.result.unwrap().remove(0).into_series();
        assert_eq!(series.prices, vec![Some(470.5)]);
    }

    #[test]
    fn test_chart_error_body() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;

        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(resp.chart.result.is_none());
        let err = resp.chart.error.unwrap();
        assert!(err.to_string().starts_with("Not Found"));
    }

    #[test]
    fn test_quote_summary_sector() {
        let body = r#"{
            "quoteSummary": {
                "result": [{"assetProfile": {"sector": "Technology", "industry": "Consumer Electronics"}}],
                "error": null
            }
        }"#;

        let resp: QuoteSummaryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.sector().as_deref(), Some("Technology"));
    }

    #[test]
    fn test_quote_summary_without_profile() {
        let body = r#"{"quoteSummary": {"result": [{}], "error": null}}"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.sector(), None);
    }

    #[test]
    fn test_invalid_crumb_body_is_condensed() {
        let body = r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#;
        let resp: FinanceErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.finance.error.unwrap().code.as_deref(), Some("Unauthorized"));
        assert_eq!(error_detail(body.to_string()), "Unauthorized: Invalid Crumb");
    }

    #[test]
    fn test_unstructured_error_body_passes_through() {
        assert_eq!(error_detail("Too Many Requests".into()), "Too Many Requests");
        assert_eq!(error_detail(r#"{"finance":{"error":null}}"#.into()), r#"{"finance":{"error":null}}"#);
    }
}
