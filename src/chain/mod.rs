pub mod aggregator;
pub mod chart;
pub mod fetcher;
pub mod models;
pub mod normalizer;
pub mod ranker;
pub mod service;

pub use aggregator::{aggregate, blended_strike, DateSummary, SideSummary};
pub use chart::{ChartView, NetTotals, Series, ViewStatus};
pub use fetcher::{FetchConfig, FetchReport, ScratchDir};
pub use models::{AnalysisConfig, ContractRow, ExpirationGroup, NormalizedChain, Side};
pub use ranker::{format_dollar_amount, is_unusual, rank_active_contracts, ActiveContract};
pub use service::{compute_option_chain_view, sanitize_ticker, OptionChainService, ServiceConfig};
