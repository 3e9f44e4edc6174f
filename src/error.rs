use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the option-chain pipeline.
///
/// Only `InvalidTicker`, `ProviderUnreachable`, `DataIntegrity` and `Scratch`
/// ever reach the caller; the rest are recovered inside the pipeline.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Market data provider unreachable for {ticker}: {reason}")]
    ProviderUnreachable { ticker: String, reason: String },

    #[error("Expiration {expiration} for {ticker} unavailable after {attempts} attempts: {reason}")]
    ProviderUnavailable {
        ticker: String,
        expiration: NaiveDate,
        attempts: usize,
        reason: String,
    },

    #[error("No options listed for {0}")]
    NoOptionsListed(String),

    #[error("Malformed {field} value '{value}'")]
    MalformedRow { field: &'static str, value: String },

    #[error("No usable option rows for {0}")]
    EmptyChain(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Scratch area error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl ChainError {
    /// Whether the pipeline degrades to an empty view instead of failing
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ChainError::NoOptionsListed(_) | ChainError::EmptyChain(_))
    }
}
