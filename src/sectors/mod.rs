pub mod holdings;
pub mod performance;

pub use holdings::{
    load_holdings, refresh_holdings, spawn_refresh_if_due, HoldingsSchedule, HoldingsSource,
    HoldingsStatus, RefreshPolicy, SsgaClient,
};
pub use performance::{compute_performance, get_etf_performance, EtfPerformance, PerformanceValue, Timeframe};
