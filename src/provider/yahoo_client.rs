use super::{HistoryRange, MarketDataProvider};
use crate::config;
use crate::models::{ChartResponse, OptionsResponse, PriceHistory, RawContract, RawOptionChain};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

// -----------------------------------------------
// RETRY CLASSIFICATION
// -----------------------------------------------

/// Outcome of one HTTP attempt that did not produce a body
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// 429 and 5xx are worth another attempt; other statuses are final
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Run `action` until it succeeds, fails with a fatal error, or `strategy` runs out
pub async fn retry_transient<I, A, Fut, T>(strategy: I, action: A) -> Result<T, FetchError>
where
    I: IntoIterator<Item = Duration>,
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    RetryIf::spawn(strategy, action, FetchError::is_transient).await
}

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
pub struct YahooClient {
    client: Client,
    crumb: Arc<RwLock<Option<String>>>,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            crumb: Arc::new(RwLock::new(None)),
        })
    }

    /// Acquire session cookie and crumb (only once per client)
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut guard = self.crumb.write().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint answers 404 but still sets the session cookie
        let _ = self
            .client
            .get(config::YAHOO_COOKIE_URL)
            .header(header::ACCEPT, "text/html")
            .send()
            .await
            .context("Failed to warm up Yahoo session")?;

        tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;

        let crumb = self
            .client
            .get(config::YAHOO_CRUMB_URL)
            .send()
            .await
            .context("Failed to request crumb")?
            .error_for_status()
            .context("Crumb request rejected")?
            .text()
            .await
            .context("Failed to read crumb")?;

        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            anyhow::bail!("Invalid crumb received");
        }

        debug!("Yahoo session warmed up");
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    /// GET a JSON body, retrying rate limits, server errors and transport failures.
    ///
    /// `retries` is the number of extra attempts after the first one.
    async fn fetch_json(&self, url: &str, retries: usize) -> Result<String> {
        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(retries);

        let text = retry_transient(backoff, || async {
            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transient(format!("Request send failed: {}", e)))?;

            let status = res.status();

            if status.is_success() {
                let text = res
                    .text()
                    .await
                    .map_err(|e| FetchError::Transient(format!("Failed to read body: {}", e)))?;

                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    return Err(FetchError::Transient(format!("Non-JSON response: {}", preview)));
                }

                Ok(text)
            } else if is_retryable_status(status) {
                warn!(%status, url, "Retryable provider error");
                Err(FetchError::Transient(format!("Retryable error: {}", status)))
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                Err(FetchError::Fatal(format!("Client error {}: {}", status, preview)))
            }
        })
        .await?;

        Ok(text)
    }

    async fn fetch_options(
        &self,
        ticker: &str,
        expiration: Option<i64>,
        retries: usize,
    ) -> Result<OptionsResponse> {
        let crumb = self.crumb().await?;
        let url = config::yahoo_options_url(ticker, expiration, &crumb);
        let text = self.fetch_json(&url, retries).await?;

        let response: OptionsResponse =
            serde_json::from_str(&text).context("Failed to parse option chain")?;

        if let Some(err) = &response.option_chain.error {
            return Err(anyhow!("Provider error for {}: {}", ticker, err));
        }

        Ok(response)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn expiration_dates(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let response = self
            .fetch_options(ticker, None, config::RETRY_MAX_ATTEMPTS)
            .await?;

        let dates = response
            .option_chain
            .result
            .into_iter()
            .next()
            .map(|result| result.expiration_dates)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|secs| DateTime::from_timestamp(secs, 0))
            .map(|ts| ts.date_naive())
            .collect();

        Ok(dates)
    }

    async fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<RawOptionChain> {
        let epoch = expiration
            .and_hms_opt(0, 0, 0)
            .context("Invalid expiration date")?
            .and_utc()
            .timestamp();

        // Single attempt; the chain fetcher owns the per-expiration retry budget
        let response = self.fetch_options(ticker, Some(epoch), 0).await?;

        let block = response
            .option_chain
            .result
            .into_iter()
            .next()
            .and_then(|result| result.options.into_iter().next())
            .with_context(|| format!("No option block for {} {}", ticker, expiration))?;

        Ok(RawOptionChain {
            calls: block.calls.into_iter().map(RawContract::from).collect(),
            puts: block.puts.into_iter().map(RawContract::from).collect(),
        })
    }

    async fn price_history(&self, ticker: &str, range: HistoryRange) -> Result<PriceHistory> {
        let crumb = self.crumb().await?;
        let url = config::yahoo_chart_url(ticker, range.as_str(), &crumb);
        let text = self.fetch_json(&url, config::RETRY_MAX_ATTEMPTS).await?;

        let response: ChartResponse =
            serde_json::from_str(&text).context("Failed to parse price history")?;

        if let Some(err) = &response.chart.error {
            return Err(anyhow!("Provider error for {}: {}", ticker, err));
        }

        let result = response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .with_context(|| format!("No price data found for {}", ticker))?;

        Ok(PriceHistory::from_chart(ticker, result))
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
pub(crate) fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_str(lang)?);
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}
