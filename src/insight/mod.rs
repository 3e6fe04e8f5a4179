use crate::config::InsightConfig;
use crate::errors::{EngineError, EngineResult};
use crate::portfolio::PortfolioMetrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const SYSTEM_PROMPT: &str = "You are a financial analyst assistant.";

const NO_KEY_REASON: &str = "no OPENAI_API_KEY configured";

const NO_KEY_TEXT: &str = "Mock insights:\n\
- Risk: High tech sector concentration\n\
- Opportunity: Strong growth in AI-related stocks\n\
- Action: Diversify into other sectors";

const FAILURE_TEXT: &str = "Mock insights:\n\
- Diversify portfolio\n\
- Review high-volatility assets";

/// Result of an insight request. Generation never fails outright:
/// any problem becomes a fallback carrying the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InsightOutcome {
    Generated { text: String },
    Fallback { reason: String, text: String },
}

impl InsightOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, InsightOutcome::Fallback { .. })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client that turns computed metrics into prose.
#[derive(Clone)]
pub struct InsightGenerator {
    client: Client,
    config: InsightConfig,
}

impl InsightGenerator {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub async fn generate(&self, metrics: &PortfolioMetrics) -> InsightOutcome {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return InsightOutcome::Fallback {
                reason: NO_KEY_REASON.to_string(),
                text: NO_KEY_TEXT.to_string(),
            };
        };

        let prompt = build_prompt(metrics);
        match self.complete(api_key, &prompt).await {
            Ok(text) => InsightOutcome::Generated { text },
            Err(e) => {
                tracing::warn!(error = %e, "insight generation failed, using fallback");
                InsightOutcome::Fallback {
                    reason: e.to_string(),
                    text: FAILURE_TEXT.to_string(),
                }
            }
        }
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> EngineResult<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Insight(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Insight(format!("HTTP {status}: {body}")));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::Insight(format!("parse: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::Insight("empty completion".into()))
    }
}

/// Plain-text summary of the metrics handed to the model.
pub fn build_prompt(metrics: &PortfolioMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Portfolio from {} to {}, total value {:.2}.",
        metrics.start_date, metrics.end_date, metrics.total_value
    );
    let _ = writeln!(
        out,
        "Annualized return {}, volatility {}, Sharpe {}, max drawdown {}.",
        pct(metrics.exp_return_annual),
        pct(metrics.volatility_annual),
        num(metrics.sharpe_annual),
        pct(metrics.max_drawdown)
    );

    out.push_str("Sector exposure:");
    for (sector, w) in &metrics.sector_exposure {
        let _ = write!(out, " {sector} {};", pct(*w));
    }
    out.push('\n');

    out.push_str("Holdings:\n");
    for t in &metrics.per_ticker {
        let _ = writeln!(
            out,
            "- {} ({}): weight {}, return {}, volatility {}, Sharpe {}, beta {}, max drawdown {}",
            t.ticker,
            t.sector,
            pct(t.weight),
            pct(t.mean_return),
            pct(t.volatility),
            num(t.sharpe),
            t.beta.map(num).unwrap_or_else(|| "n/a".to_string()),
            pct(t.max_drawdown)
        );
    }

    out.push_str("List the main risks, opportunities, and concrete actions for this portfolio.");
    out
}

fn pct(v: f64) -> String {
    if v.is_finite() {
        format!("{:.1}%", v * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn num(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "n/a".to_string()
    }
}
