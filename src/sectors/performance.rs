use crate::models::PriceHistory;
use crate::provider::{HistoryRange, MarketDataProvider};
use chrono::{Datelike, Duration, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Look-back windows offered on the sector page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1-day")]
    OneDay,
    #[serde(rename = "1-week")]
    OneWeek,
    #[serde(rename = "1-month")]
    OneMonth,
    #[serde(rename = "3-month")]
    ThreeMonth,
    #[serde(rename = "year-to-date")]
    YearToDate,
    #[serde(rename = "1-year")]
    OneYear,
    #[serde(rename = "5-year")]
    FiveYear,
    #[serde(rename = "max")]
    Max,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
        Timeframe::ThreeMonth,
        Timeframe::YearToDate,
        Timeframe::OneYear,
        Timeframe::FiveYear,
        Timeframe::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneDay => "1-day",
            Timeframe::OneWeek => "1-week",
            Timeframe::OneMonth => "1-month",
            Timeframe::ThreeMonth => "3-month",
            Timeframe::YearToDate => "year-to-date",
            Timeframe::OneYear => "1-year",
            Timeframe::FiveYear => "5-year",
            Timeframe::Max => "max",
        }
    }

    /// Target date of the reference close; `None` means the first close on record
    pub fn target_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        let days_back = |days| Some(today - Duration::days(days));
        match self {
            Timeframe::OneDay => days_back(1),
            Timeframe::OneWeek => days_back(7),
            Timeframe::OneMonth => days_back(30),
            Timeframe::ThreeMonth => days_back(90),
            Timeframe::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Timeframe::OneYear => days_back(365),
            Timeframe::FiveYear => days_back(1825),
            Timeframe::Max => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown timeframe '{}'", s))
    }
}

/// Percent change rounded to two decimals, or `N/A`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceValue {
    Percent(f64),
    NotAvailable,
}

impl Serialize for PerformanceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PerformanceValue::Percent(value) => serializer.serialize_f64(*value),
            PerformanceValue::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// Per-ETF result; a failed ETF carries an error message instead of metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EtfPerformance {
    Metrics(BTreeMap<Timeframe, PerformanceValue>),
    Error { error: String },
}

impl EtfPerformance {
    pub fn unavailable() -> Self {
        EtfPerformance::Error {
            error: "Data not available".to_string(),
        }
    }

    pub fn get(&self, timeframe: Timeframe) -> PerformanceValue {
        match self {
            EtfPerformance::Metrics(metrics) => metrics
                .get(&timeframe)
                .copied()
                .unwrap_or(PerformanceValue::NotAvailable),
            EtfPerformance::Error { .. } => PerformanceValue::NotAvailable,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Latest close versus the close on the nearest date on or before each target
pub fn compute_performance(history: &PriceHistory, today: NaiveDate) -> Option<BTreeMap<Timeframe, PerformanceValue>> {
    let latest = history.closes.last()?;
    let first = history.closes.first()?;

    let metrics = Timeframe::ALL
        .iter()
        .map(|timeframe| {
            let reference = match timeframe.target_date(today) {
                Some(target) => history
                    .closes
                    .iter()
                    .rev()
                    .find(|c| c.date <= target)
                    .map(|c| c.close),
                None => Some(first.close),
            };

            let value = match reference {
                Some(previous) if previous != 0.0 => {
                    PerformanceValue::Percent(round2((latest.close - previous) / previous * 100.0))
                }
                _ => PerformanceValue::NotAvailable,
            };
            (*timeframe, value)
        })
        .collect();

    Some(metrics)
}

/// Performance of each ETF from its full daily history; failures stay per ETF
pub async fn get_etf_performance(
    provider: &dyn MarketDataProvider,
    etfs: &[&str],
    today: NaiveDate,
) -> BTreeMap<String, EtfPerformance> {
    let results = join_all(etfs.iter().map(|etf| async move {
        let performance = match provider.price_history(etf, HistoryRange::Max).await {
            Ok(history) => match compute_performance(&history, today) {
                Some(metrics) => EtfPerformance::Metrics(metrics),
                None => {
                    warn!(etf, "No price data found");
                    EtfPerformance::unavailable()
                }
            },
            Err(e) => {
                warn!(etf, error = %format!("{:#}", e), "Price history unavailable");
                EtfPerformance::unavailable()
            }
        };
        (etf.to_string(), performance)
    }))
    .await;

    results.into_iter().collect()
}
