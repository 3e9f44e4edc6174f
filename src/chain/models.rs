use crate::config;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Call,
    Put,
}

impl Side {
    /// Directory and filename suffix used in the scratch area
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Side::Call => "CALLS",
            Side::Put => "PUTS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Call => "CALL",
            Side::Put => "PUT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One typed contract observation; `None` means the value is unknown
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRow {
    pub strike: Option<f64>,
    pub side: Side,
    pub expiration: NaiveDate,
    pub open_interest: Option<u64>,
    pub volume: Option<u64>,
    pub last_price: Option<f64>,
    pub last_trade: Option<DateTime<Local>>,
}

impl ContractRow {
    /// volume × last price × contract multiplier
    pub fn notional(&self) -> Option<f64> {
        match (self.volume, self.last_price) {
            (Some(volume), Some(price)) => Some(volume as f64 * price * config::CONTRACT_MULTIPLIER),
            _ => None,
        }
    }
}

/// Display key of an expiration date
pub fn date_label(date: NaiveDate) -> String {
    date.format("%m/%d/%y").to_string()
}

/// All rows of one side for one expiration, in ingestion order
#[derive(Debug, Clone, PartialEq)]
pub struct ExpirationGroup {
    pub expiration: NaiveDate,
    pub label: String,
    pub side: Side,
    pub rows: Vec<ContractRow>,
}

impl ExpirationGroup {
    pub fn new(expiration: NaiveDate, side: Side, rows: Vec<ContractRow>) -> Self {
        Self {
            expiration,
            label: date_label(expiration),
            side,
            rows,
        }
    }
}

/// Both sides, each ordered by expiration ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedChain {
    pub calls: Vec<ExpirationGroup>,
    pub puts: Vec<ExpirationGroup>,
}

impl NormalizedChain {
    pub fn side(&self, side: Side) -> &[ExpirationGroup] {
        match side {
            Side::Call => &self.calls,
            Side::Put => &self.puts,
        }
    }

    pub fn group(&self, side: Side, expiration: NaiveDate) -> Option<&ExpirationGroup> {
        self.side(side).iter().find(|g| g.expiration == expiration)
    }

    /// Union of expirations across both sides, ascending
    pub fn expirations(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .calls
            .iter()
            .chain(self.puts.iter())
            .map(|g| g.expiration)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    pub fn is_empty(&self) -> bool {
        self.calls.iter().chain(self.puts.iter()).all(|g| g.rows.is_empty())
    }
}

/// Tunables shared by the aggregator and the ranker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Strikes ranked per side and date
    pub top_n: usize,
    /// Most-active contracts kept across all dates and sides
    pub top_k: usize,
    /// Drop candidates whose last trade was not today (local time)
    pub require_today_local: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: config::DEFAULT_TOP_N,
            top_k: config::DEFAULT_TOP_K,
            require_today_local: true,
        }
    }
}
