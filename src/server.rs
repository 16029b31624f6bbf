use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::stock::{StockDirectory, StockRecord};

type SharedDirectory = Arc<StockDirectory>;

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn health_check() -> &'static str {
    "Stock dashboard API is running"
}

async fn list_stocks(State(directory): State<SharedDirectory>) -> Json<Vec<StockRecord>> {
    Json(directory.list_stocks().await)
}

async fn get_stock(
    State(directory): State<SharedDirectory>,
    Path(symbol): Path<String>,
) -> Json<StockRecord> {
    info!("🔎 API lookup for {symbol}");
    Json(directory.get_stock(&symbol).await)
}

async fn search_stocks(
    State(directory): State<SharedDirectory>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<StockRecord>> {
    Json(directory.search_stocks(&params.q).await)
}

/// JSON routes over the directory; every lookup answers 200 with a record
pub fn router(directory: SharedDirectory) -> Router {
    // The dashboard UI is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .route("/api/stocks", get(list_stocks))
        .route("/api/stocks/:symbol", get(get_stock))
        .route("/api/search", get(search_stocks))
        .with_state(directory)
        .layer(cors)
}

pub async fn serve(
    directory: StockDirectory,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(directory));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("Failed to bind to port: {e}"))?;

    info!("👂 Stock API listening on port {port}");

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server failed: {e}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::alpha_vantage::AlphaVantageProvider;
    use crate::stock::cache::CacheStore;
    use crate::stock::testing::{full_transport, FakeTransport};
    use crate::storage::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(transport: Arc<FakeTransport>) -> Router {
        let provider = AlphaVantageProvider::with_transport(
            transport,
            CacheStore::transient(Duration::minutes(30)),
            None,
        );
        let durable =
            CacheStore::new("durable", Arc::new(MemoryStore::new()), Duration::minutes(30));
        let directory = StockDirectory::new(
            Arc::new(provider),
            durable,
            vec!["AAPL".to_string(), "MSFT".to_string()],
        );
        router(Arc::new(directory))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_short_search_returns_empty_list() {
        let transport = full_transport("AAPL");
        let (status, body) = get_json(app(transport.clone()), "/api/search?q=a").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_without_query_returns_empty_list() {
        let (status, body) = get_json(app(full_transport("AAPL")), "/api/search").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_list_returns_watch_list_in_order() {
        let (status, body) = get_json(app(full_transport("AAPL")), "/api/stocks").await;
        assert_eq!(status, StatusCode::OK);

        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["symbol"], "AAPL");
        assert_eq!(records[0]["source"], "provider");
        assert_eq!(records[0]["marketCap"], "$2.41T");
        assert_eq!(records[1]["symbol"], "MSFT");
        assert_eq!(records[1]["source"], "mock");
        assert!(records[1]["performanceData"].is_array());
    }

    #[tokio::test]
    async fn test_get_returns_camel_case_record() {
        let (status, body) = get_json(app(full_transport("AAPL")), "/api/stocks/aapl").await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["price"], 150.0);
        assert_eq!(body["peRatio"], "29.10");
        assert_eq!(body["technicalIndicators"]["rsi"], 56.78);
        assert!(body.get("changePercent").is_some());
        assert!(body.get("change_percent").is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_symbol_still_answers() {
        let app = app(Arc::new(FakeTransport::new()));
        let (status, body) = get_json(app, "/api/stocks/zzz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "ZZZ");
        assert_eq!(body["source"], "mock");
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app(full_transport("AAPL"))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
