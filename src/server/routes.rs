use crate::errors::{EngineError, EngineResult};
use crate::insight::InsightOutcome;
use crate::portfolio::{analyze_portfolio, PortfolioMetrics, PortfolioRequest};
use crate::state::{AppState, Counters};
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;
use tracing::Instrument;

/// GET /healthz -- liveness probe
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// POST /portfolio/analyze -- fetch market data, run the risk engine
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PortfolioRequest>,
) -> Result<Json<PortfolioMetrics>, EngineError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("analyze", %request_id);

    let result = run_analysis(&state, &req).instrument(span).await;

    match &result {
        Ok(m) => {
            Counters::bump(&state.counters.analyses_served);
            tracing::info!(
                %request_id,
                tickers = m.per_ticker.len(),
                total_value = m.total_value,
                sharpe = m.sharpe_annual,
                "analysis complete"
            );
        }
        Err(e) if e.is_client_error() => {
            Counters::bump(&state.counters.analyses_failed);
            tracing::warn!(%request_id, error = %e, "analysis rejected");
        }
        Err(e) => {
            Counters::bump(&state.counters.analyses_failed);
            tracing::error!(%request_id, error = %e, "error during portfolio analysis");
        }
    }

    result.map(Json)
}

async fn run_analysis(state: &AppState, req: &PortfolioRequest) -> EngineResult<PortfolioMetrics> {
    let quantities = req.quantities()?;
    let tickers: Vec<String> = quantities.keys().cloned().collect();
    let benchmark = req.benchmark_symbol(&state.config.default_benchmark)?;
    let years = state.config.lookback_years;

    tracing::info!(?tickers, %benchmark, currency = %req.currency, "analyzing portfolio");

    let prices = state.market.fetch_prices(&tickers, years).await?;
    if prices.is_empty() {
        return Err(EngineError::EmptyPriceData);
    }

    let benchmark_prices = state.market.fetch_benchmark(&benchmark, years).await?;
    let sectors = state.market.fetch_sectors(&tickers).await;

    analyze_portfolio(&quantities, &prices, &benchmark_prices, &sectors)
}

/// POST /portfolio/insights -- narrative over previously computed metrics
pub async fn insights(
    State(state): State<Arc<AppState>>,
    Json(metrics): Json<PortfolioMetrics>,
) -> Json<InsightOutcome> {
    let outcome = state.insights.generate(&metrics).await;
    if outcome.is_fallback() {
        Counters::bump(&state.counters.insight_fallbacks);
    } else {
        Counters::bump(&state.counters.insights_generated);
    }
    Json(outcome)
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.counters.snapshot())
}
