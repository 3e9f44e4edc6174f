use crate::chain::{sanitize_ticker, ChartView, OptionChainService, ServiceConfig};
use crate::config;
use crate::error::ChainError;
use crate::provider::{MarketDataProvider, YahooClient};
use crate::sectors::{
    get_etf_performance, load_holdings, spawn_refresh_if_due, EtfPerformance, HoldingsSchedule,
    HoldingsSource, HoldingsStatus, PerformanceValue, RefreshPolicy, SsgaClient, Timeframe,
};
use crate::watchlist::{Watchlist, WatchlistEntry, WatchlistStore};
use anyhow::Result;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

// -----------------------------------------------
// API REQUEST/RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    #[serde(default)]
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    #[serde(default)]
    pub etf: String,
    #[serde(default)]
    pub timeframe: String,
}

#[derive(Debug, Deserialize)]
pub struct TimeframeQuery {
    #[serde(default)]
    pub timeframe: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SectorsResponse {
    pub performance: BTreeMap<String, EtfPerformance>,
    pub holdings: BTreeMap<String, HoldingsStatus>,
    pub refresh_started: bool,
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub performance: PerformanceValue,
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn respond<T>(data: T, start_time: Instant) -> ApiResult<T> {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }),
    )
}

fn reject<T>(status: StatusCode, message: impl Into<String>, start_time: Instant) -> ApiResult<T> {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }),
    )
}

fn chain_error_status(err: &ChainError) -> StatusCode {
    match err {
        ChainError::InvalidTicker(_) => StatusCode::BAD_REQUEST,
        ChainError::ProviderUnreachable { .. } | ChainError::ProviderUnavailable { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    service: OptionChainService,
    holdings_source: Arc<dyn HoldingsSource>,
    holdings_dir: PathBuf,
    schedule: Arc<RwLock<HoldingsSchedule>>,
    watchlist: Arc<Mutex<WatchlistStore>>,
}

impl AppState {
    pub fn new(
        service: OptionChainService,
        holdings_source: Arc<dyn HoldingsSource>,
        holdings_dir: PathBuf,
        watchlist: WatchlistStore,
    ) -> Self {
        Self {
            service,
            holdings_source,
            holdings_dir,
            schedule: Arc::new(RwLock::new(HoldingsSchedule::new(RefreshPolicy::default()))),
            watchlist: Arc::new(Mutex::new(watchlist)),
        }
    }

    /// Production wiring: Yahoo quotes, SSGA holdings, env-configured paths
    pub fn from_env() -> Result<Self> {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooClient::new()?);
        Ok(Self::new(
            OptionChainService::new(provider, ServiceConfig::from_env()),
            Arc::new(SsgaClient::new()?),
            config::get_holdings_dir(),
            WatchlistStore::new(config::get_watchlist_path()),
        ))
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

async fn chart_for(app_state: &AppState, raw_ticker: &str, start_time: Instant) -> ApiResult<ChartView> {
    let ticker = match sanitize_ticker(raw_ticker) {
        Ok(ticker) => ticker,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };

    match app_state.service.compute_option_chain_view(&ticker).await {
        Ok(view) => respond(view, start_time),
        Err(e) => {
            error!(ticker, error = %e, "Option chain request failed");
            reject(chain_error_status(&e), e.to_string(), start_time)
        }
    }
}

/// GET /api/option-chain?ticker=SPY
async fn get_option_chain(
    State(app_state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> ApiResult<ChartView> {
    chart_for(&app_state, &query.ticker, Instant::now()).await
}

/// POST /api/process-ticker (form field `ticker`)
async fn process_ticker(
    State(app_state): State<AppState>,
    Form(form): Form<TickerQuery>,
) -> ApiResult<ChartView> {
    chart_for(&app_state, &form.ticker, Instant::now()).await
}

/// GET /api/sectors - performance for every sector ETF plus cached holdings
async fn get_sectors(State(app_state): State<AppState>) -> ApiResult<SectorsResponse> {
    let start_time = Instant::now();

    let refresh_started = spawn_refresh_if_due(
        Arc::clone(&app_state.schedule),
        Arc::clone(&app_state.holdings_source),
        app_state.holdings_dir.clone(),
    )
    .await;

    let provider = app_state.service.provider();
    let performance =
        get_etf_performance(provider.as_ref(), config::SECTOR_ETFS, Local::now().date_naive()).await;

    let holdings = config::SECTOR_ETFS
        .iter()
        .map(|etf| (etf.to_string(), load_holdings(&app_state.holdings_dir, etf)))
        .collect();

    respond(
        SectorsResponse {
            performance,
            holdings,
            refresh_started,
        },
        start_time,
    )
}

/// GET /api/sectors/performance?etf=XLK&timeframe=1-week
async fn get_performance(
    State(app_state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> ApiResult<PerformanceResponse> {
    let start_time = Instant::now();

    let timeframe: Timeframe = match query.timeframe.parse() {
        Ok(timeframe) => timeframe,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };
    let etf = match sanitize_ticker(&query.etf) {
        Ok(etf) => etf,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };

    let provider = app_state.service.provider();
    let results = get_etf_performance(provider.as_ref(), &[etf.as_str()], Local::now().date_naive()).await;

    let performance = results
        .get(&etf)
        .map(|p| p.get(timeframe))
        .unwrap_or(PerformanceValue::NotAvailable);

    respond(PerformanceResponse { performance }, start_time)
}

/// GET /api/sectors/performance-group?timeframe=1-week
async fn get_performance_group(
    State(app_state): State<AppState>,
    Query(query): Query<TimeframeQuery>,
) -> ApiResult<BTreeMap<String, PerformanceResponse>> {
    let start_time = Instant::now();

    let timeframe: Timeframe = match query.timeframe.parse() {
        Ok(timeframe) => timeframe,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };

    let provider = app_state.service.provider();
    let results =
        get_etf_performance(provider.as_ref(), config::SECTOR_ETFS, Local::now().date_naive()).await;

    let group = results
        .into_iter()
        .map(|(etf, metrics)| {
            (
                etf,
                PerformanceResponse {
                    performance: metrics.get(timeframe),
                },
            )
        })
        .collect();

    respond(group, start_time)
}

/// GET /api/watchlist
async fn get_watchlist(State(app_state): State<AppState>) -> ApiResult<Watchlist> {
    let start_time = Instant::now();
    let store = app_state.watchlist.lock().await;

    match store.load() {
        Ok(watchlist) => respond(watchlist, start_time),
        Err(e) => reject(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e), start_time),
    }
}

/// POST /api/watchlist (JSON entry)
async fn upsert_watchlist(
    State(app_state): State<AppState>,
    Json(mut entry): Json<WatchlistEntry>,
) -> ApiResult<Watchlist> {
    let start_time = Instant::now();

    entry.ticker = match sanitize_ticker(&entry.ticker) {
        Ok(ticker) => ticker,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };

    let store = app_state.watchlist.lock().await;
    match store.upsert(entry) {
        Ok(watchlist) => respond(watchlist, start_time),
        Err(e) => reject(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e), start_time),
    }
}

/// DELETE /api/watchlist/{ticker}
async fn remove_watchlist(
    State(app_state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<String> {
    let start_time = Instant::now();

    let ticker = match sanitize_ticker(&ticker) {
        Ok(ticker) => ticker,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string(), start_time),
    };

    let store = app_state.watchlist.lock().await;
    match store.remove(&ticker) {
        Ok(true) => respond(ticker, start_time),
        Ok(false) => reject(StatusCode::NOT_FOUND, format!("{} is not on the watchlist", ticker), start_time),
        Err(e) => reject(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e), start_time),
    }
}

// -----------------------------------------------
// ROUTER AND SERVER
// -----------------------------------------------

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/option-chain", get(get_option_chain))
        .route("/api/process-ticker", post(process_ticker))
        .route("/api/sectors", get(get_sectors))
        .route("/api/sectors/performance", get(get_performance))
        .route("/api/sectors/performance-group", get(get_performance_group))
        .route("/api/watchlist", get(get_watchlist).post(upsert_watchlist))
        .route("/api/watchlist/{ticker}", delete(remove_watchlist))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(app_state)
}

pub async fn start_server(port: u16) -> Result<()> {
    let app = router(AppState::from_env()?);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "Vectr API server running");
    println!("🚀 Vectr API Server running on http://{}", addr);
    println!("📋 Available endpoints:");
    println!("   GET    /api/option-chain?ticker=SPY");
    println!("   POST   /api/process-ticker   (form: ticker=SPY)");
    println!("   GET    /api/sectors");
    println!("   GET    /api/sectors/performance?etf=XLK&timeframe=1-week");
    println!("   GET    /api/sectors/performance-group?timeframe=1-week");
    println!("   GET    /api/watchlist");
    println!("   POST   /api/watchlist");
    println!("   DELETE /api/watchlist/{{ticker}}");
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
