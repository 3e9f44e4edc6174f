use super::models::Side;
use crate::config;
use crate::error::ChainError;
use crate::models::{RawContract, RawOptionChain};
use crate::provider::MarketDataProvider;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

/// Retry and parallelism knobs for per-expiration fetches
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: config::FETCH_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(config::FETCH_RETRY_DELAY_SECS),
            max_concurrent: config::DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Per-request staging directory, removed when dropped
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn create(root: &Path, ticker: &str) -> Result<Self, ChainError> {
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("vectr-{}-", ticker))
            .tempdir_in(root)?;

        for side in [Side::Call, Side::Put] {
            std::fs::create_dir(dir.path().join(side.file_suffix()))?;
        }

        debug!(path = %dir.path().display(), "Scratch area created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove now and report failures; dropping removes silently
    pub fn close(self) -> Result<(), ChainError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "Scratch area removed");
        Ok(())
    }
}

/// What happened to each expiration the provider listed
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub listed: Vec<NaiveDate>,
    pub fetched: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

/// Scratch file of one side for one expiration, e.g. `CALLS/20240621CALLS.csv`
pub fn scratch_file(dir: &Path, side: Side, expiration: NaiveDate) -> PathBuf {
    dir.join(side.file_suffix()).join(format!(
        "{}{}.csv",
        expiration.format("%Y%m%d"),
        side.file_suffix()
    ))
}

/// Fetch every listed expiration into the scratch area.
///
/// A date that keeps failing is logged and left out; only a failure to list
/// expirations at all is returned as an error.
pub async fn fetch_to_scratch(
    provider: Arc<dyn MarketDataProvider>,
    ticker: &str,
    scratch: &ScratchDir,
    fetch_config: &FetchConfig,
) -> Result<FetchReport, ChainError> {
    let listed = provider
        .expiration_dates(ticker)
        .await
        .map_err(|e| ChainError::ProviderUnreachable {
            ticker: ticker.to_string(),
            reason: format!("{:#}", e),
        })?;

    if listed.is_empty() {
        return Err(ChainError::NoOptionsListed(ticker.to_string()));
    }

    info!(ticker, expirations = listed.len(), "Fetching option chain");

    let semaphore = Arc::new(Semaphore::new(fetch_config.max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for expiration in listed.iter().copied() {
        let provider = Arc::clone(&provider);
        let sem = Arc::clone(&semaphore);
        let ticker = ticker.to_string();
        let dir = scratch.path().to_path_buf();
        let fetch_config = fetch_config.clone();

        tasks.spawn(async move {
            let outcome = async {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| std::io::Error::other(format!("Semaphore error: {}", e)))?;

                match fetch_expiration(provider.as_ref(), &ticker, expiration, &fetch_config).await {
                    Ok(chain) => {
                        write_chain(&dir, expiration, &chain)?;
                        Ok::<bool, ChainError>(true)
                    }
                    Err(e) => {
                        error!(error = %e, "Giving up on expiration");
                        Ok(false)
                    }
                }
            }
            .await;

            (expiration, outcome)
        });
    }

    let mut report = FetchReport {
        listed,
        ..FetchReport::default()
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((expiration, Ok(true))) => report.fetched.push(expiration),
            Ok((expiration, Ok(false))) => report.failed.push(expiration),
            Ok((expiration, Err(e))) => {
                error!(%expiration, error = %e, "Scratch write failed, cancelling remaining fetches");
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => warn!(error = %e, "Fetch task aborted"),
        }
    }

    // Tasks that panicked never reported their date
    for expiration in &report.listed {
        if !report.fetched.contains(expiration) && !report.failed.contains(expiration) {
            report.failed.push(*expiration);
        }
    }
    report.fetched.sort();
    report.failed.sort();

    Ok(report)
}

/// Fetch one expiration with a fixed delay between attempts
pub async fn fetch_expiration(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    expiration: NaiveDate,
    fetch_config: &FetchConfig,
) -> Result<RawOptionChain, ChainError> {
    let max_attempts = fetch_config.max_attempts.max(1);
    let strategy = FixedInterval::new(fetch_config.retry_delay).take(max_attempts - 1);
    let mut attempt = 0usize;

    Retry::spawn(strategy, || {
        attempt += 1;
        let current = attempt;
        async move {
            provider.option_chain(ticker, expiration).await.map_err(|e| {
                warn!(
                    ticker,
                    %expiration,
                    attempt = current,
                    max_attempts,
                    error = %e,
                    "Expiration fetch attempt failed"
                );
                e
            })
        }
    })
    .await
    .map_err(|e| ChainError::ProviderUnavailable {
        ticker: ticker.to_string(),
        expiration,
        attempts: max_attempts,
        reason: format!("{:#}", e),
    })
}

fn write_chain(dir: &Path, expiration: NaiveDate, chain: &RawOptionChain) -> Result<(), ChainError> {
    write_side(dir, Side::Call, expiration, &chain.calls)?;
    write_side(dir, Side::Put, expiration, &chain.puts)
}

fn write_side(
    dir: &Path,
    side: Side,
    expiration: NaiveDate,
    rows: &[RawContract],
) -> Result<(), ChainError> {
    let path = scratch_file(dir, side, expiration);
    let mut writer = csv::Writer::from_path(&path).map_err(std::io::Error::other)?;

    for row in rows {
        writer.serialize(row).map_err(std::io::Error::other)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fetch_config() {
        let fetch_config = FetchConfig::default();
        assert_eq!(fetch_config.max_attempts, 3);
        assert_eq!(fetch_config.retry_delay, Duration::from_secs(5));
        assert!(fetch_config.max_concurrent >= 1);
    }

    #[test]
    fn test_scratch_file_layout() {
        let expiration = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let path = scratch_file(Path::new("/tmp/x"), Side::Put, expiration);
        assert_eq!(path, Path::new("/tmp/x/PUTS/20240621PUTS.csv"));
    }
}
