use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

// -----------------------------------------------
// YAHOO OPTIONS ENDPOINT
// -----------------------------------------------

/// Main response structure from the Yahoo options API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsResponse {
    #[serde(rename = "optionChain")]
    pub option_chain: OptionChainEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainEnvelope {
    #[serde(default)]
    pub result: Vec<OptionChainResult>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainResult {
    #[serde(rename = "underlyingSymbol")]
    pub underlying_symbol: Option<String>,

    /// Expirations as unix seconds (midnight UTC of the expiration day)
    #[serde(rename = "expirationDates", default)]
    pub expiration_dates: Vec<i64>,

    #[serde(default)]
    pub options: Vec<OptionsBlock>,
}

/// Calls and puts for a single expiration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsBlock {
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<i64>,

    #[serde(default)]
    pub calls: Vec<YahooContract>,

    #[serde(default)]
    pub puts: Vec<YahooContract>,
}

/// Contract as served by Yahoo; every field may be missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooContract {
    #[serde(rename = "contractSymbol")]
    pub contract_symbol: Option<String>,

    pub strike: Option<f64>,

    #[serde(rename = "lastPrice")]
    pub last_price: Option<f64>,

    pub volume: Option<f64>,

    #[serde(rename = "openInterest")]
    pub open_interest: Option<f64>,

    /// Unix seconds, UTC
    #[serde(rename = "lastTradeDate")]
    pub last_trade_date: Option<i64>,
}

// -----------------------------------------------
// YAHOO CHART ENDPOINT
// -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,

    #[serde(default)]
    pub timestamp: Vec<i64>,

    pub indicators: Indicators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartMeta {
    pub symbol: Option<String>,

    #[serde(rename = "longName")]
    pub long_name: Option<String>,

    #[serde(rename = "shortName")]
    pub short_name: Option<String>,

    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteIndicator {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

// -----------------------------------------------
// PROVIDER-NEUTRAL RAW DATA
// -----------------------------------------------

/// Timestamp layout used for `lastTradeDate` in the scratch CSV files
pub const RAW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S+00:00";

/// One untyped contract row, written verbatim to the scratch area
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContract {
    pub contract_symbol: String,
    pub strike: Option<f64>,
    pub last_price: Option<f64>,
    pub volume: Option<f64>,
    pub open_interest: Option<f64>,
    pub last_trade_date: Option<String>,
}

impl From<YahooContract> for RawContract {
    fn from(contract: YahooContract) -> Self {
        let last_trade_date = contract
            .last_trade_date
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|ts| ts.format(RAW_TIMESTAMP_FORMAT).to_string());

        Self {
            contract_symbol: contract.contract_symbol.unwrap_or_default(),
            strike: contract.strike,
            last_price: contract.last_price,
            volume: contract.volume,
            open_interest: contract.open_interest,
            last_trade_date,
        }
    }
}

/// Both sides of the chain for one expiration
#[derive(Debug, Clone, Default)]
pub struct RawOptionChain {
    pub calls: Vec<RawContract>,
    pub puts: Vec<RawContract>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes in ascending date order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub long_name: Option<String>,
    pub closes: Vec<DailyClose>,
}

impl PriceHistory {
    pub fn from_chart(symbol: &str, result: ChartResult) -> Self {
        let closes = result
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or_default();

        let mut daily: Vec<DailyClose> = result
            .timestamp
            .iter()
            .zip(closes.iter())
            .filter_map(|(secs, close)| {
                let date = DateTime::from_timestamp(*secs, 0)?.date_naive();
                let close = (*close)?;
                Some(DailyClose { date, close })
            })
            .collect();
        daily.sort_by_key(|d| d.date);

        Self {
            symbol: symbol.to_string(),
            long_name: result.meta.long_name.or(result.meta.short_name),
            closes: daily,
        }
    }
}

/// Headline price information shown above the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub previous_close: Option<f64>,
    pub daily_change: f64,
    pub daily_change_pct: f64,
}

impl Quote {
    /// Latest close is the current price; the close before it is the reference
    pub fn from_history(history: &PriceHistory) -> Option<Self> {
        let last = history.closes.last()?;
        let previous_close = history
            .closes
            .len()
            .checked_sub(2)
            .map(|idx| history.closes[idx].close);

        let (daily_change, daily_change_pct) = match previous_close {
            Some(prev) if prev != 0.0 => {
                let change = last.close - prev;
                (change, change / prev * 100.0)
            }
            _ => (0.0, 0.0),
        };

        Some(Self {
            symbol: history.symbol.clone(),
            company_name: history
                .long_name
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            current_price: last.close,
            previous_close,
            daily_change,
            daily_change_pct,
        })
    }
}
