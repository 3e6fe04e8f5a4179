use crate::errors::{EngineError, EngineResult};
use crate::portfolio::types::is_valid_benchmark;

/// Credentials and tuning for the insight generator.
/// Loaded once at startup, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct InsightConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub price_api_base_url: String,
    pub sector_api_base_url: String,
    pub session_cookie_url: String,
    pub crumb_url: String,
    pub lookback_years: u32,
    pub default_benchmark: String,
    pub provider_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    pub insight: InsightConfig,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let lookback_years = env_var_or("LOOKBACK_YEARS", "3")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("LOOKBACK_YEARS: {e}")))?;
        if lookback_years == 0 {
            return Err(EngineError::Config("LOOKBACK_YEARS must be at least 1".into()));
        }

        let provider_timeout_secs = env_var_or("PROVIDER_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("PROVIDER_TIMEOUT_SECS: {e}")))?;

        let default_benchmark = env_var_or("DEFAULT_BENCHMARK", "SPY").trim().to_uppercase();
        if !is_valid_benchmark(&default_benchmark) {
            return Err(EngineError::Config(format!(
                "DEFAULT_BENCHMARK {default_benchmark:?} is not a valid symbol"
            )));
        }

        let max_tokens = env_var_or("OPENAI_MAX_TOKENS", "300")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("OPENAI_MAX_TOKENS: {e}")))?;

        Ok(Self {
            server_port,
            price_api_base_url: env_var_or(
                "PRICE_API_BASE_URL",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            ),
            sector_api_base_url: env_var_or(
                "SECTOR_API_BASE_URL",
                "https://query2.finance.yahoo.com/v10/finance/quoteSummary",
            ),
            session_cookie_url: env_var_or("YAHOO_COOKIE_URL", "https://fc.yahoo.com"),
            crumb_url: env_var_or(
                "YAHOO_CRUMB_URL",
                "https://query2.finance.yahoo.com/v1/test/getcrumb",
            ),
            lookback_years,
            default_benchmark,
            provider_timeout_secs,
            cors_origins: parse_origins(&env_var_or(
                "CORS_ORIGINS",
                "http://localhost:5173,http://127.0.0.1:5173",
            )),
            insight: InsightConfig {
                api_key: std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: env_var_or("OPENAI_MODEL", "gpt-4o-mini"),
                max_tokens,
            },
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_blanks() {
        let origins = parse_origins(" http://a:1, ,http://b:2,");
        assert_eq!(origins, vec!["http://a:1".to_string(), "http://b:2".to_string()]);
    }
}
