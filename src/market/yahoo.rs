use super::types::{error_detail, ChartResponse, QuoteSummaryResponse};
use super::{resolve_sectors, MarketData, PriceSeries, PriceTable, SectorMap};
use crate::errors::{EngineError, EngineResult};
use futures_util::future::{join_all, BoxFuture};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) portfolio_risk/0.1";

/// Cookie + crumb pair quoteSummary requires. The crumb is bound to the
/// cookie held in the client's cookie store.
struct Session {
    cookie_url: String,
    crumb_url: String,
    crumb: Mutex<Option<String>>,
}

/// Yahoo Finance REST client. All methods return Result, never panic.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    chart_base_url: String,
    profile_base_url: String,
    session: Option<Arc<Session>>,
}

impl YahooClient {
    pub fn new(chart_base_url: &str, profile_base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .user_agent(USER_AGENT)
                .cookie_store(true)
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            chart_base_url: chart_base_url.trim_end_matches('/').to_string(),
            profile_base_url: profile_base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Enables the cookie/crumb handshake for sector lookups.
    pub fn with_session(mut self, cookie_url: &str, crumb_url: &str) -> Self {
        self.session = Some(Arc::new(Session {
            cookie_url: cookie_url.to_string(),
            crumb_url: crumb_url.to_string(),
            crumb: Mutex::new(None),
        }));
        self
    }

    async fn public_get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> EngineResult<T> {
        let resp = self.client.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Provider {
                status: status.as_u16(),
                body: error_detail(body),
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Crumb for the current session, handshaking on first use.
    /// `None` when no session is configured.
    pub async fn session_crumb(&self) -> EngineResult<Option<String>> {
        let Some(session) = &self.session else {
            return Ok(None);
        };

        let mut cached = session.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(Some(crumb.clone()));
        }

        // Only the Set-Cookie matters; fc.yahoo.com answers 404.
        self.client.get(&session.cookie_url).send().await?;

        let resp = self.client.get(&session.crumb_url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(EngineError::Provider {
                status: status.as_u16(),
                body: error_detail(body),
            });
        }

        let crumb = parse_crumb(&body)?;
        tracing::info!("yahoo session established");
        *cached = Some(crumb.clone());
        Ok(Some(crumb))
    }

    async fn forget_crumb(&self) {
        if let Some(session) = &self.session {
            *session.crumb.lock().await = None;
        }
    }

    /// Daily adjusted closes for `symbol` over the last `years`.
    /// An unknown symbol yields an empty series rather than an error.
    pub async fn get_chart(&self, symbol: &str, years: u32) -> EngineResult<PriceSeries> {
        let url = format!("{}/{symbol}", self.chart_base_url);
        let query = [
            ("range", format!("{years}y")),
            ("interval", "1d".to_string()),
            ("events", "div,splits".to_string()),
        ];

        let resp: ChartResponse = match self.public_get(&url, &query).await {
            Ok(r) => r,
            Err(EngineError::Provider { status: 404, .. }) => {
                tracing::warn!(symbol = %symbol, "no price history found");
                return Ok(PriceSeries::default());
            }
            Err(e) => return Err(e),
        };

        if let Some(err) = resp.chart.error {
            tracing::warn!(symbol = %symbol, error = %err, "chart request returned an error");
            return Ok(PriceSeries::default());
        }

        Ok(resp
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| r.into_series())
            .unwrap_or_default())
    }

    /// Sector label from the asset profile, if Yahoo reports one.
    /// A 401 drops the cached crumb so the next batch re-handshakes.
    pub async fn get_sector(
        &self,
        symbol: &str,
        crumb: Option<&str>,
    ) -> EngineResult<Option<String>> {
        let url = format!("{}/{symbol}", self.profile_base_url);
        let mut query = vec![("modules", "assetProfile".to_string())];
        if let Some(crumb) = crumb {
            query.push(("crumb", crumb.to_string()));
        }

        let resp: QuoteSummaryResponse = match self.public_get(&url, &query).await {
            Ok(r) => r,
            Err(e @ EngineError::Provider { status: 401, .. }) => {
                self.forget_crumb().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if let Some(err) = &resp.quote_summary.error {
            return Err(EngineError::Parse(format!("quoteSummary {symbol}: {err}")));
        }
        Ok(resp.sector())
    }
}

/// getcrumb answers with the bare token; HTML or JSON means the cookie was refused.
fn parse_crumb(body: &str) -> EngineResult<String> {
    let crumb = body.trim();
    if crumb.is_empty()
        || crumb.starts_with('<')
        || crumb.starts_with('{')
        || crumb.chars().any(char::is_whitespace)
    {
        return Err(EngineError::Parse(format!("unexpected crumb response: {crumb:.80}")));
    }
    Ok(crumb.to_string())
}

impl MarketData for YahooClient {
    fn fetch_prices<'a>(
        &'a self,
        tickers: &'a [String],
        years: u32,
    ) -> BoxFuture<'a, EngineResult<PriceTable>> {
        Box::pin(async move {
            let downloads = tickers.iter().map(|t| self.get_chart(t, years));
            let results = join_all(downloads).await;

            let mut series = Vec::with_capacity(tickers.len());
            for (ticker, result) in tickers.iter().zip(results) {
                match result {
                    Ok(s) => series.push((ticker.clone(), s)),
                    Err(e) => {
                        tracing::error!(ticker = %ticker, error = %e, "price download failed");
                        return Err(e);
                    }
                }
            }

            let table = PriceTable::from_series(series)?;
            if table.is_empty() {
                tracing::warn!(?tickers, "no price data fetched");
            }
            Ok(table)
        })
    }

    fn fetch_benchmark<'a>(
        &'a self,
        symbol: &'a str,
        years: u32,
    ) -> BoxFuture<'a, EngineResult<PriceSeries>> {
        Box::pin(async move {
            self.get_chart(symbol, years).await.map_err(|e| {
                tracing::error!(benchmark = %symbol, error = %e, "benchmark download failed");
                e
            })
        })
    }

    fn fetch_sectors<'a>(&'a self, tickers: &'a [String]) -> BoxFuture<'a, SectorMap> {
        Box::pin(async move {
            let crumb = match self.session_crumb().await {
                Ok(crumb) => crumb,
                Err(e) => {
                    tracing::warn!(error = %e, "yahoo session handshake failed");
                    return resolve_sectors(tickers.iter().map(|t| (t.clone(), Ok(None))).collect());
                }
            };

            let lookups =
                join_all(tickers.iter().map(|t| self.get_sector(t, crumb.as_deref()))).await;
            resolve_sectors(tickers.iter().cloned().zip(lookups).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::UNKNOWN_SECTOR;
    use axum::extract::{Path, Query, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const COOKIE: &str = "A3=d=session-1";
    const CRUMB: &str = "kX7.q/9fTzQ";

    fn has_cookie(headers: &HeaderMap) -> bool {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains(COOKIE))
    }

    fn unauthorized() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#,
        )
            .into_response()
    }

    /// Local stand-in for fc.yahoo.com, getcrumb and quoteSummary.
    async fn spawn_yahoo() -> (String, Arc<AtomicUsize>) {
        let crumb_calls = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route(
                "/fc",
                get(|| async {
                    (StatusCode::NOT_FOUND, [(header::SET_COOKIE, format!("{COOKIE}; Path=/"))])
                }),
            )
            .route(
                "/getcrumb",
                get(|State(calls): State<Arc<AtomicUsize>>, headers: HeaderMap| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if has_cookie(&headers) {
                        CRUMB.into_response()
                    } else {
                        unauthorized()
                    }
                }),
            )
            .route(
                "/qs/{symbol}",
                get(
                    |Path(symbol): Path<String>,
                     Query(q): Query<HashMap<String, String>>,
                     headers: HeaderMap| async move {
                        if !has_cookie(&headers) || q.get("crumb").map(String::as_str) != Some(CRUMB) {
                            return unauthorized();
                        }
                        let sector = if symbol == "XOM" { "Energy" } else { "Technology" };
                        axum::Json(serde_json::json!({
                            "quoteSummary": {
                                "result": [{"assetProfile": {"sector": sector}}],
                                "error": null
                            }
                        }))
                        .into_response()
                    },
                ),
            )
            .with_state(crumb_calls.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), crumb_calls)
    }

    #[test]
    fn test_base_urls_trimmed() {
        let client = YahooClient::new("http://localhost:1/chart/", "http://localhost:1/qs//", 5);
        assert_eq!(client.chart_base_url, "http://localhost:1/chart");
        assert_eq!(client.profile_base_url, "http://localhost:1/qs");
    }

    #[test]
    fn test_parse_crumb() {
        assert_eq!(parse_crumb("  kX7.q/9fTzQ\n").unwrap(), "kX7.q/9fTzQ");
        assert!(parse_crumb("").is_err());
        assert!(parse_crumb("<html>Too Many Requests</html>").is_err());
        assert!(parse_crumb(r#"{"finance":{"error":{}}}"#).is_err());
    }

    #[tokio::test]
    async fn test_sectors_use_cookie_and_crumb() {
        let (base, crumb_calls) = spawn_yahoo().await;
        let client = YahooClient::new(&base, &format!("{base}/qs"), 5)
            .with_session(&format!("{base}/fc"), &format!("{base}/getcrumb"));
        let tickers = vec!["AAPL".to_string(), "XOM".to_string()];

        let sectors = client.fetch_sectors(&tickers).await;
        assert_eq!(sectors["AAPL"], "Technology");
        assert_eq!(sectors["XOM"], "Energy");

        // crumb is cached for the session
        let again = client.fetch_sectors(&tickers).await;
        assert_eq!(again, sectors);
        assert_eq!(crumb_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_crumb_is_unauthorized() {
        let (base, _) = spawn_yahoo().await;
        let client = YahooClient::new(&base, &format!("{base}/qs"), 5);

        let result = client.get_sector("AAPL", None).await;
        match result {
            Err(EngineError::Provider { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized: Invalid Crumb");
            }
            other => panic!("expected 401 provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_crumb_is_forgotten() {
        let (base, crumb_calls) = spawn_yahoo().await;
        let client = YahooClient::new(&base, &format!("{base}/qs"), 5)
            .with_session(&format!("{base}/fc"), &format!("{base}/getcrumb"));

        assert!(client.get_sector("AAPL", Some("stale")).await.is_err());
        let crumb = client.session_crumb().await.unwrap();
        assert_eq!(crumb.as_deref(), Some(CRUMB));
        assert_eq!(crumb_calls.load(Ordering::SeqCst), 1);

        assert!(client.get_sector("AAPL", Some("stale")).await.is_err());
        client.session_crumb().await.unwrap();
        assert_eq!(crumb_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_sector_source_degrades_to_unknown() {
        // Nothing listens on port 9.
        let client = YahooClient::new("http://127.0.0.1:9", "http://127.0.0.1:9", 2)
            .with_session("http://127.0.0.1:9", "http://127.0.0.1:9");
        let tickers = vec!["AAPL".to_string(), "XOM".to_string()];
        let sectors = client.fetch_sectors(&tickers).await;
        assert_eq!(sectors.len(), 2);
        assert!(sectors.values().all(|s| s == UNKNOWN_SECTOR));
    }

    #[tokio::test]
    async fn test_unreachable_price_source_is_an_error() {
        let client = YahooClient::new("http://127.0.0.1:9", "http://127.0.0.1:9", 2);
        let tickers = vec!["AAPL".to_string()];
        let result = client.fetch_prices(&tickers, 1).await;
        assert!(matches!(result, Err(EngineError::Network(_))));
    }
}
