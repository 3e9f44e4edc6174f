mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{date, example_calls, StubProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use vectr::api_server_axum::{router, AppState};
use vectr::chain::{FetchConfig, OptionChainService, ServiceConfig};
use vectr::sectors::SsgaClient;
use vectr::watchlist::WatchlistStore;

fn app(root: &TempDir) -> Router {
    let provider = StubProvider::default().with_chain(date(2024, 6, 21), example_calls());
    let config = ServiceConfig {
        fetch: FetchConfig {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
            max_concurrent: 2,
        },
        scratch_root: root.path().join("scratch"),
        ..ServiceConfig::default()
    };

    router(AppState::new(
        OptionChainService::new(Arc::new(provider), config),
        Arc::new(SsgaClient::new().unwrap()),
        root.path().join("sectors"),
        WatchlistStore::new(root.path().join("watchlist.json")),
    ))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_ticker_is_bad_request_with_security_headers() {
        let root = TempDir::new().unwrap();
        let response = app(&root)
            .oneshot(Request::get("/api/option-chain?ticker=").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_process_ticker_form() {
        let root = TempDir::new().unwrap();
        let response = app(&root)
            .oneshot(
                Request::post("/api/process-ticker")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("ticker=+test+"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["ticker"], "TEST");
        assert_eq!(body["data"]["dates"][0], "06/21/24");
        assert_eq!(body["data"]["status"]["state"], "complete");
    }

    #[tokio::test]
    async fn test_unknown_timeframe_is_bad_request() {
        let root = TempDir::new().unwrap();
        let response = app(&root)
            .oneshot(
                Request::get("/api/sectors/performance-group?timeframe=2-week")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_watchlist_round_trip() {
        let root = TempDir::new().unwrap();
        let app = app(&root);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/watchlist")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"ticker":"spy","notes":"hedge"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::get("/api/watchlist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["SPY"]["notes"], "hedge");
        assert_eq!(body["data"]["SPY"]["expiry"], Value::Null);

        let response = app
            .clone()
            .oneshot(Request::delete("/api/watchlist/SPY").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::delete("/api/watchlist/SPY").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
