use crate::config::AppConfig;
use crate::insight::InsightGenerator;
use crate::market::MarketData;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free request counters, read by the /api/counters endpoint.
#[derive(Debug, Default)]
pub struct Counters {
    pub analyses_served: AtomicU64,
    pub analyses_failed: AtomicU64,
    pub insights_generated: AtomicU64,
    pub insight_fallbacks: AtomicU64,
}

impl Counters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        use Ordering::Relaxed;
        serde_json::json!({
            "analyses_served": self.analyses_served.load(Relaxed),
            "analyses_failed": self.analyses_failed.load(Relaxed),
            "insights_generated": self.insights_generated.load(Relaxed),
            "insight_fallbacks": self.insight_fallbacks.load(Relaxed),
        })
    }
}

/// Shared, read-only application state. Built once in main.
pub struct AppState {
    pub config: AppConfig,
    pub market: Arc<dyn MarketData>,
    pub insights: InsightGenerator,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig, market: Arc<dyn MarketData>) -> Arc<Self> {
        let insights = InsightGenerator::new(config.insight.clone());
        Arc::new(Self {
            config,
            market,
            insights,
            counters: Counters::default(),
        })
    }
}
