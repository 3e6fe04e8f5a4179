/// Domain-specific error types for the risk engine and its collaborators.
/// Precondition failures are client-correctable and must stay distinct from
/// upstream provider failures, which are reported as opaque internal errors.
/// Degenerate numeric conditions (zero variance, short overlaps) are never
/// errors: the engine substitutes 0.0 or NaN for those.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("market data provider error: {status} {body}")]
    Provider { status: u16, body: String },

    #[error("Could not fetch prices for given tickers")]
    EmptyPriceData,

    #[error("no price data for ticker {0}")]
    MissingPrice(String),

    #[error("weight vector has {actual} entries, price table has {expected} columns")]
    WeightMismatch { expected: usize, actual: usize },

    #[error("no weight for price table column {0}")]
    MissingWeight(String),

    #[error("invalid holding: {0}")]
    InvalidHolding(String),

    #[error("invalid benchmark symbol {0:?}")]
    InvalidBenchmark(String),

    #[error("invalid price table: {0}")]
    InvalidTable(String),

    #[error("insight generation error: {0}")]
    Insight(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// True for failures the caller can correct by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::EmptyPriceData
                | EngineError::MissingPrice(_)
                | EngineError::WeightMismatch { .. }
                | EngineError::MissingWeight(_)
                | EngineError::InvalidHolding(_)
                | EngineError::InvalidBenchmark(_)
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
