use std::path::PathBuf;
use std::time::Duration;

// -----------------------------------------------
// YAHOO FINANCE ENDPOINTS
// -----------------------------------------------
pub const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const YAHOO_CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
pub const YAHOO_API_BASE_URL: &str = "https://query2.finance.yahoo.com";

pub fn yahoo_options_url(ticker: &str, expiration: Option<i64>, crumb: &str) -> String {
    let mut url = format!(
        "{}/v7/finance/options/{}?crumb={}",
        YAHOO_API_BASE_URL,
        urlencoding::encode(ticker),
        urlencoding::encode(crumb)
    );
    if let Some(epoch) = expiration {
        url.push_str(&format!("&date={}", epoch));
    }
    url
}

pub fn yahoo_chart_url(ticker: &str, range: &str, crumb: &str) -> String {
    format!(
        "{}/v8/finance/chart/{}?range={}&interval=1d&crumb={}",
        YAHOO_API_BASE_URL,
        urlencoding::encode(ticker),
        urlencoding::encode(range),
        urlencoding::encode(crumb)
    )
}

// -----------------------------------------------
// SSGA FUND HOLDINGS
// -----------------------------------------------
pub fn ssga_holdings_url(etf: &str) -> String {
    format!(
        "https://www.ssga.com/us/en/intermediary/library-content/products/fund-data/etfs/us/holdings-daily-us-en-{}.xlsx",
        etf.to_lowercase()
    )
}

pub const SSGA_REFERER: &str = "https://www.ssga.com/us/en/intermediary/etfs/";

/// Preamble rows above the header row in the SSGA spreadsheet
pub const HOLDINGS_SKIP_ROWS: usize = 4;
pub const HOLDINGS_TOP: usize = 10;
pub const HOLDINGS_DROPPED_COLUMNS: &[&str] =
    &["Identifier", "SEDOL", "Sector", "Local Currency", "Shares Held"];
pub const HOLDINGS_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// -----------------------------------------------
// SECTOR ETFS
// -----------------------------------------------
pub const SECTOR_ETFS: &[&str] = &[
    "XLRE", "XLE", "XLU", "XLK", "XLB", "XLP", "XLY", "XLI", "XLC", "XLV", "XLF", "XBI",
];

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-CA,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// HTTP RETRY CONFIG (rate limits / server errors)
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// PER-EXPIRATION FETCH RETRY
// -----------------------------------------------
pub const FETCH_MAX_ATTEMPTS: usize = 3;
pub const FETCH_RETRY_DELAY_SECS: u64 = 5;

// -----------------------------------------------
// CONCURRENCY LIMITS
// -----------------------------------------------
pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const HOLDINGS_MAX_CONCURRENT: usize = 5;

// -----------------------------------------------
// AGGREGATION DEFAULTS
// -----------------------------------------------
pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_TOP_K: usize = 5;

/// Standard equity option contract multiplier
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Get the execution mode from environment or default to server
pub fn get_execution_mode() -> String {
    std::env::var("VECTR_MODE").unwrap_or_else(|_| "server".to_string())
}

/// Get ticker for single mode execution
pub fn get_single_ticker() -> String {
    std::env::var("VECTR_TICKER").unwrap_or_else(|_| "SPY".to_string())
}

/// Get port from environment or default
pub fn get_port() -> u16 {
    std::env::var("VECTR_PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(5000)
}

/// Root under which per-request scratch directories are created
pub fn get_scratch_root() -> PathBuf {
    std::env::var("VECTR_SCRATCH_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

pub fn get_log_dir() -> PathBuf {
    std::env::var("VECTR_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("logs"))
}

pub fn get_holdings_dir() -> PathBuf {
    std::env::var("VECTR_HOLDINGS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("sectors"))
}

pub fn get_watchlist_path() -> PathBuf {
    std::env::var("VECTR_WATCHLIST")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("watchlist.json"))
}

/// Number of "most active" annotations, overridable for the older 4-contract layout
pub fn get_top_k() -> usize {
    if let Ok(val) = std::env::var("VECTR_TOP_K") {
        if let Ok(num) = val.parse::<usize>() {
            return num.clamp(1, 20);
        }
    }
    DEFAULT_TOP_K
}

/// Get concurrency for per-expiration fetches
pub fn get_max_concurrent() -> usize {
    if let Ok(val) = std::env::var("VECTR_MAX_CONCURRENT") {
        if let Ok(num) = val.parse::<usize>() {
            return num.clamp(1, 20);
        }
    }
    DEFAULT_MAX_CONCURRENT
}
