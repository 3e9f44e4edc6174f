use super::aggregator::aggregate;
use super::chart::{assemble, net_totals, ChartView, ViewStatus};
use super::fetcher::{fetch_to_scratch, FetchConfig, FetchReport, ScratchDir};
use super::models::{date_label, AnalysisConfig};
use super::normalizer::normalize_scratch;
use super::ranker::rank_active_contracts;
use crate::config;
use crate::error::ChainError;
use crate::models::Quote;
use crate::provider::{HistoryRange, MarketDataProvider};
use crate::utility::{timed_async, Timer};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the pipeline needs besides the provider
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub analysis: AnalysisConfig,
    pub fetch: FetchConfig,
    /// Parent directory of the per-request scratch areas
    pub scratch_root: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            fetch: FetchConfig::default(),
            scratch_root: std::env::temp_dir(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            analysis: AnalysisConfig {
                top_k: config::get_top_k(),
                ..AnalysisConfig::default()
            },
            fetch: FetchConfig {
                max_concurrent: config::get_max_concurrent(),
                ..FetchConfig::default()
            },
            scratch_root: config::get_scratch_root(),
        }
    }
}

/// Ticker -> ChartView pipeline over one market-data provider
#[derive(Clone)]
pub struct OptionChainService {
    provider: Arc<dyn MarketDataProvider>,
    config: ServiceConfig,
}

impl OptionChainService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: ServiceConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> Arc<dyn MarketDataProvider> {
        Arc::clone(&self.provider)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Fetch, normalize, aggregate, rank and assemble one ticker.
    ///
    /// The scratch area is removed before returning, whatever the outcome.
    pub async fn compute_option_chain_view(&self, ticker: &str) -> Result<ChartView, ChainError> {
        let ticker = sanitize_ticker(ticker)?;
        let ticker = ticker.as_str();

        let _timer = Timer::start(format!("option chain {}", ticker));
        let quote = timed_async(format!("quote {}", ticker), || self.fetch_quote(ticker)).await;

        let scratch = ScratchDir::create(&self.config.scratch_root, ticker)?;
        let result = self.run_pipeline(ticker, &scratch, quote).await;

        if let Err(e) = scratch.close() {
            warn!(ticker, error = %e, "Failed to remove scratch area");
        }

        result
    }

    async fn run_pipeline(
        &self,
        ticker: &str,
        scratch: &ScratchDir,
        quote: Option<Quote>,
    ) -> Result<ChartView, ChainError> {
        let fetch_timer = Timer::start(format!("fetch {}", ticker));
        let report = match fetch_to_scratch(self.provider(), ticker, scratch, &self.config.fetch).await {
            Ok(report) => report,
            Err(e) if e.is_empty_result() => {
                info!(ticker, "No options listed");
                return Ok(ChartView::empty(ticker, ViewStatus::NoOptionsListed, quote));
            }
            Err(e) => return Err(e),
        };
        fetch_timer.stop();

        let (chain, normalize_report) = match normalize_scratch(ticker, scratch.path()) {
            Ok(normalized) => normalized,
            Err(e) if e.is_empty_result() => {
                warn!(ticker, failed = report.failed.len(), "Option chain has no usable rows");
                return Ok(ChartView::empty(ticker, ViewStatus::EmptyChain, quote));
            }
            Err(e) => return Err(e),
        };

        let analysis = &self.config.analysis;
        let summaries = aggregate(&chain, analysis);
        let active = rank_active_contracts(&chain, analysis, Local::now().date_naive());

        info!(
            ticker,
            expirations = summaries.len(),
            rows = normalize_report.rows,
            malformed_fields = normalize_report.malformed_fields,
            active = active.len(),
            "Option chain aggregated"
        );

        assemble(
            ticker,
            &summaries,
            &active,
            net_totals(&chain),
            quote,
            analysis.top_n,
            view_status(&report),
        )
    }

    /// Headline quote; the view is still produced without one
    async fn fetch_quote(&self, ticker: &str) -> Option<Quote> {
        match self.provider.price_history(ticker, HistoryRange::FiveDays).await {
            Ok(history) => Quote::from_history(&history),
            Err(e) => {
                warn!(ticker, error = %format!("{:#}", e), "Quote unavailable");
                None
            }
        }
    }
}

fn view_status(report: &FetchReport) -> ViewStatus {
    if report.failed.is_empty() {
        ViewStatus::Complete
    } else {
        let mut failed = report.failed.clone();
        failed.sort();
        ViewStatus::Partial {
            failed_dates: failed.into_iter().map(date_label).collect(),
        }
    }
}

/// One-shot form of [`OptionChainService::compute_option_chain_view`]
pub async fn compute_option_chain_view(
    provider: Arc<dyn MarketDataProvider>,
    config: &ServiceConfig,
    ticker: &str,
) -> Result<ChartView, ChainError> {
    OptionChainService::new(provider, config.clone())
        .compute_option_chain_view(ticker)
        .await
}

/// Normalize user input into a provider symbol: trimmed, upper-case, `[A-Z0-9.^-]`
pub fn sanitize_ticker(raw: &str) -> Result<String, ChainError> {
    let ticker = raw.trim().to_uppercase();

    if ticker.is_empty()
        || !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '-'))
    {
        return Err(ChainError::InvalidTicker(raw.to_string()));
    }

    Ok(ticker)
}
