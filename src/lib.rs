pub mod api_server_axum;
pub mod app_config;
pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod sectors;
pub mod utility;
pub mod watchlist;

// Re-exports for convenience
pub use chain::{compute_option_chain_view, ChartView, OptionChainService, ServiceConfig};
pub use error::ChainError;
pub use provider::{MarketDataProvider, YahooClient};
