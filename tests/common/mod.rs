#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use vectr::models::{DailyClose, PriceHistory, RawContract, RawOptionChain, RAW_TIMESTAMP_FORMAT};
use vectr::provider::{HistoryRange, MarketDataProvider};

/// In-memory provider with scripted failures and call counting
#[derive(Default)]
pub struct StubProvider {
    pub listing_error: Option<String>,
    pub expirations: Vec<NaiveDate>,
    pub chains: HashMap<NaiveDate, RawOptionChain>,
    pub failing: HashSet<NaiveDate>,
    pub histories: HashMap<String, PriceHistory>,
    pub attempts: Mutex<HashMap<NaiveDate, usize>>,
}

impl StubProvider {
    pub fn with_chain(mut self, expiration: NaiveDate, chain: RawOptionChain) -> Self {
        self.expirations.push(expiration);
        self.chains.insert(expiration, chain);
        self
    }

    pub fn with_failing(mut self, expiration: NaiveDate) -> Self {
        self.expirations.push(expiration);
        self.failing.insert(expiration);
        self
    }

    pub fn with_history(mut self, history: PriceHistory) -> Self {
        self.histories.insert(history.symbol.clone(), history);
        self
    }

    pub fn attempts(&self, expiration: NaiveDate) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&expiration)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn expiration_dates(&self, _ticker: &str) -> Result<Vec<NaiveDate>> {
        match &self.listing_error {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(self.expirations.clone()),
        }
    }

    async fn option_chain(&self, _ticker: &str, expiration: NaiveDate) -> Result<RawOptionChain> {
        *self.attempts.lock().unwrap().entry(expiration).or_insert(0) += 1;

        if self.failing.contains(&expiration) {
            return Err(anyhow!("HTTP 503 for {}", expiration));
        }
        self.chains
            .get(&expiration)
            .cloned()
            .ok_or_else(|| anyhow!("No chain for {}", expiration))
    }

    async fn price_history(&self, ticker: &str, _range: HistoryRange) -> Result<PriceHistory> {
        self.histories
            .get(ticker)
            .cloned()
            .ok_or_else(|| anyhow!("No price data found for {}", ticker))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Provider timestamp for a trade that happened just now
pub fn traded_now() -> Option<String> {
    Some(Local::now().with_timezone(&Utc).format(RAW_TIMESTAMP_FORMAT).to_string())
}

pub fn contract(strike: f64, open_interest: f64, volume: f64, last_price: f64) -> RawContract {
    RawContract {
        contract_symbol: format!("TEST{}", strike),
        strike: Some(strike),
        last_price: Some(last_price),
        volume: Some(volume),
        open_interest: Some(open_interest),
        last_trade_date: traded_now(),
    }
}

/// The documented example: two calls on 2024-06-21
pub fn example_calls() -> RawOptionChain {
    RawOptionChain {
        calls: vec![contract(100.0, 500.0, 600.0, 1.5), contract(105.0, 800.0, 50.0, 0.5)],
        puts: vec![],
    }
}

pub fn history(symbol: &str, closes: &[(NaiveDate, f64)]) -> PriceHistory {
    PriceHistory {
        symbol: symbol.to_string(),
        long_name: Some(format!("{} Test Fund", symbol)),
        closes: closes
            .iter()
            .map(|(date, close)| DailyClose {
                date: *date,
                close: *close,
            })
            .collect(),
    }
}
