pub mod yahoo_client;

use crate::models::{PriceHistory, RawOptionChain};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use yahoo_client::YahooClient;

/// History window requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    FiveDays,
    Max,
}

impl HistoryRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::FiveDays => "5d",
            HistoryRange::Max => "max",
        }
    }
}

/// Market-data boundary used by the option-chain pipeline and the sector page
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Expirations listed for `ticker`; empty when the ticker has no options
    async fn expiration_dates(&self, ticker: &str) -> Result<Vec<NaiveDate>>;

    /// Calls and puts for one expiration
    async fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<RawOptionChain>;

    async fn price_history(&self, ticker: &str, range: HistoryRange) -> Result<PriceHistory>;
}
