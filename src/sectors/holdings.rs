use crate::config;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info, warn};

/// Where fund holdings spreadsheets come from
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    /// Raw xlsx bytes for one ETF
    async fn download(&self, etf: &str) -> Result<Vec<u8>>;
}

pub struct SsgaClient {
    client: Client,
}

impl SsgaClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: crate::provider::yahoo_client::build_client()?,
        })
    }
}

#[async_trait]
impl HoldingsSource for SsgaClient {
    async fn download(&self, etf: &str) -> Result<Vec<u8>> {
        let url = config::ssga_holdings_url(etf);
        let res = self
            .client
            .get(&url)
            .header(header::REFERER, config::SSGA_REFERER)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9",
            )
            .send()
            .await
            .with_context(|| format!("Failed to download {} holdings", etf))?;

        let status = res.status();
        if !status.is_success() {
            bail!("Failed to download {} holdings. Status code: {}", etf, status);
        }

        let bytes = res.bytes().await.context("Failed to read holdings body")?;
        Ok(bytes.to_vec())
    }
}

// -----------------------------------------------
// SHEET CLEANING
// -----------------------------------------------

/// Cleaned top holdings of one fund, columns in sheet order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl HoldingsTable {
    /// Display strings, with the weight column rendered as `x%`
    pub fn display(&self) -> HoldingsView {
        let weight_idx = self.columns.iter().position(|c| c == "Weight");

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(idx, cell)| {
                        let text = cell_text(cell);
                        if Some(idx) == weight_idx && !text.is_empty() {
                            format!("{}%", text)
                        } else {
                            text
                        }
                    })
                    .collect()
            })
            .collect();

        HoldingsView {
            columns: self.columns.clone(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingsView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.trim().to_string()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}

/// First worksheet of an xlsx file as JSON cells
pub fn read_sheet(bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).context("Not a valid xlsx workbook")?;

    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no worksheets")?
        .context("Failed to read worksheet")?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rounded_weight(cell: &Value) -> Value {
    let weight = match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };

    weight
        .and_then(|w| serde_json::Number::from_f64(round2(w)))
        .map(Value::Number)
        .unwrap_or_else(|| cell.clone())
}

/// Skip the preamble, drop unused columns, keep the top rows, round `Weight`
pub fn clean_holdings(rows: &[Vec<Value>], skip_rows: usize, top: usize) -> Result<HoldingsTable> {
    let mut remaining = rows.iter().skip(skip_rows);
    let header = remaining.next().context("Holdings sheet has no header row")?;

    let kept: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| (idx, cell_text(cell).trim().to_string()))
        .filter(|(_, name)| !name.is_empty() && !config::HOLDINGS_DROPPED_COLUMNS.contains(&name.as_str()))
        .collect();

    let Some(weight_pos) = kept.iter().position(|(_, name)| name == "Weight") else {
        bail!("Holdings sheet has no Weight column");
    };

    let rows = remaining
        .filter(|row| row.iter().any(|cell| !cell.is_null()))
        .take(top)
        .map(|row| {
            kept.iter()
                .enumerate()
                .map(|(pos, (idx, _))| {
                    let cell = row.get(*idx).cloned().unwrap_or(Value::Null);
                    if pos == weight_pos { rounded_weight(&cell) } else { cell }
                })
                .collect()
        })
        .collect();

    Ok(HoldingsTable {
        columns: kept.into_iter().map(|(_, name)| name).collect(),
        rows,
    })
}

// -----------------------------------------------
// CACHE FILES
// -----------------------------------------------

pub fn holdings_file(dir: &Path, etf: &str) -> PathBuf {
    dir.join(format!("{}_holdings.json", etf))
}

/// What the sector page can show for one ETF
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "holdings", rename_all = "snake_case")]
pub enum HoldingsStatus {
    Ready(HoldingsView),
    Updating,
    Error,
}

pub fn load_holdings(dir: &Path, etf: &str) -> HoldingsStatus {
    let path = holdings_file(dir, etf);
    if !path.exists() {
        return HoldingsStatus::Updating;
    }

    let table = std::fs::read_to_string(&path)
        .context("Failed to read holdings file")
        .and_then(|text| {
            serde_json::from_str::<HoldingsTable>(&text).context("Failed to parse holdings file")
        });

    match table {
        Ok(table) => HoldingsStatus::Ready(table.display()),
        Err(e) => {
            error!(etf, path = %path.display(), error = %format!("{:#}", e), "Error loading holdings data");
            HoldingsStatus::Error
        }
    }
}

async fn update_etf(source: &dyn HoldingsSource, dir: &Path, etf: &str) -> Result<()> {
    let bytes = source.download(etf).await?;
    let rows = read_sheet(&bytes)?;
    let table = clean_holdings(&rows, config::HOLDINGS_SKIP_ROWS, config::HOLDINGS_TOP)?;

    let path = holdings_file(dir, etf);
    tokio::fs::write(&path, serde_json::to_vec_pretty(&table)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(etf, path = %path.display(), "Holdings cleaned and saved");
    Ok(())
}

/// ETFs updated and ETFs that failed during one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

/// Download and clean holdings for every ETF, a bounded number at a time
pub async fn refresh_holdings(
    source: Arc<dyn HoldingsSource>,
    dir: &Path,
    etfs: &[&str],
    max_concurrent: usize,
) -> Result<RefreshReport> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(etfs.len());

    for etf in etfs {
        let source = Arc::clone(&source);
        let sem = Arc::clone(&semaphore);
        let dir = dir.to_path_buf();
        let name = etf.to_string();

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await?;
            update_etf(source.as_ref(), &dir, &name).await
        });
        handles.push((etf.to_string(), handle));
    }

    let mut report = RefreshReport::default();
    for (etf, handle) in handles {
        match handle.await {
            Ok(Ok(())) => report.updated.push(etf),
            Ok(Err(e)) => {
                warn!(etf, error = %format!("{:#}", e), "Error processing holdings");
                report.failed.push(etf);
            }
            Err(e) => {
                warn!(etf, error = %e, "Holdings task aborted");
                report.failed.push(etf);
            }
        }
    }

    info!(updated = report.updated.len(), failed = report.failed.len(), "Holdings refresh finished");
    Ok(report)
}

// -----------------------------------------------
// REFRESH SCHEDULING
// -----------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: config::HOLDINGS_REFRESH_INTERVAL,
        }
    }
}

/// Refresh bookkeeping owned by the server state
#[derive(Debug, Clone, Default)]
pub struct HoldingsSchedule {
    pub policy: RefreshPolicy,
    pub last_run: Option<DateTime<Utc>>,
    pub in_progress: bool,
}

impl HoldingsSchedule {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            last_run: None,
            in_progress: false,
        }
    }

    /// Due when never run, when the interval has elapsed or when the cache is gone
    pub fn is_due(&self, now: DateTime<Utc>, cache_exists: bool) -> bool {
        if self.in_progress {
            return false;
        }
        if !cache_exists {
            return true;
        }
        match self.last_run {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed > self.policy.interval)
                .unwrap_or(false),
        }
    }
}

/// Start a background refresh when one is due; returns whether one started
pub async fn spawn_refresh_if_due(
    schedule: Arc<RwLock<HoldingsSchedule>>,
    source: Arc<dyn HoldingsSource>,
    dir: PathBuf,
) -> bool {
    {
        let mut guard = schedule.write().await;
        if !guard.is_due(Utc::now(), dir.exists()) {
            return false;
        }
        guard.in_progress = true;
    }

    info!(dir = %dir.display(), "Starting background holdings refresh");

    tokio::spawn(async move {
        let result = refresh_holdings(source, &dir, config::SECTOR_ETFS, config::HOLDINGS_MAX_CONCURRENT).await;
        if let Err(e) = &result {
            error!(error = %format!("{:#}", e), "Holdings refresh failed");
        }

        let mut guard = schedule.write().await;
        guard.in_progress = false;
        if result.is_ok() {
            guard.last_run = Some(Utc::now());
        }
    });

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rounded_weight() {
        assert_eq!(rounded_weight(&json!(7.12345)), json!(7.12));
        assert_eq!(rounded_weight(&json!("3.456")), json!(3.46));
        assert_eq!(rounded_weight(&json!("-")), json!("-"));
    }

    #[test]
    fn test_schedule_is_due() {
        let now = Utc::now();
        let mut schedule = HoldingsSchedule::default();
        assert!(schedule.is_due(now, true));

        schedule.last_run = Some(now - chrono::Duration::hours(1));
        assert!(!schedule.is_due(now, true));
        assert!(schedule.is_due(now, false));

        schedule.last_run = Some(now - chrono::Duration::hours(25));
        assert!(schedule.is_due(now, true));

        schedule.in_progress = true;
        assert!(!schedule.is_due(now, false));
    }
}
