//! Farmwatch REST API
//!
//! HTTP service over the document store, built with Axum.
//!
//! # Endpoints
//!
//! ## Readings
//! - `GET /api/readings/recent?limit=N` - Most recent N readings, oldest first
//! - `POST /api/readings` - Ingest one reading
//!
//! ## Settings
//! - `GET /api/users/:user_id/settings` - Settings document
//! - `POST|PUT /api/users/:user_id/settings` - Merge into the document
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/ws/live` - Live reading stream
//!
//! # Example
//!
//! ```rust,no_run
//! use farmwatch::api::{serve, AppState};
//! use farmwatch::config::ApiConfig;
//! use farmwatch::store::DocumentStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DocumentStore::open("farmwatch.db")?);
//!     serve(AppState::new(store, ApiConfig::default())).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::websocket::live_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let api_routes = Router::new()
        .route("/readings/recent", get(routes::readings::recent))
        .route("/readings", post(routes::readings::ingest))
        .route(
            "/users/:user_id/settings",
            get(routes::settings::get_settings)
                .post(routes::settings::update_settings)
                .put(routes::settings::update_settings),
        )
        .layer(TimeoutLayer::new(timeout))
        // Long-lived; outside the request timeout
        .route("/ws/live", get(live_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

/// Start the API server on the configured address
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Farmwatch API listening on {}", addr);

    serve_with_listener(listener, state, shutdown_signal()).await?;

    tracing::info!("Farmwatch API shut down gracefully");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_with_listener(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ApiError> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, SettingsStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<DocumentStore>) {
        let store = Arc::new(DocumentStore::in_memory().unwrap());
        let config = ApiConfig {
            max_history_limit: 50,
            ..Default::default()
        };
        let router = build_router(AppState::new(Arc::clone(&store), config));
        (router, store)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_json(method: &str, uri: &str, body: impl Into<String>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.into()))
            .unwrap()
    }

    fn reading_json(timestamp: i64, temp: f64) -> String {
        json!({
            "timestamp": timestamp,
            "owm_temp": temp,
            "owm_humidity": 55.0,
            "owm_pressure": 1013.0,
            "owm_wind_speed": 3.2,
            "owm_weather": "scattered clouds"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _store) = create_test_app();

        let (status, _) = send(app.clone(), get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(app.clone(), get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["readings"], 0);
    }

    #[tokio::test]
    async fn test_recent_empty() {
        let (app, _store) = create_test_app();

        let (status, body) = send(app, get("/api/readings/recent")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "data": []}));
    }

    #[tokio::test]
    async fn test_ingest_then_recent_is_ascending() {
        let (app, store) = create_test_app();

        for (ts, temp) in [(3000, 22.0), (1000, 20.0), (2000, 21.0)] {
            let (status, body) =
                send(app.clone(), with_json("POST", "/api/readings", reading_json(ts, temp))).await;
            assert_eq!(status, StatusCode::CREATED);
            assert!(body["data"]["server_received_ts"].is_i64());
        }
        assert_eq!(store.reading_count().unwrap(), 3);

        let (status, body) = send(app, get("/api/readings/recent?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["timestamp"], 2000);
        assert_eq!(data[1]["timestamp"], 3000);
    }

    #[tokio::test]
    async fn test_recent_bad_limit_falls_back() {
        let (app, _store) = create_test_app();
        for ts in 0..30 {
            send(app.clone(), with_json("POST", "/api/readings", reading_json(ts, 10.0))).await;
        }

        let (_, body) = send(app.clone(), get("/api/readings/recent?limit=lots")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 24);

        let (_, body) = send(app, get("/api/readings/recent?limit=1000")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_ingest_invalid_json() {
        let (app, _store) = create_test_app();

        let (status, body) = send(app, with_json("POST", "/api/readings", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_settings_not_found() {
        let (app, _store) = create_test_app();

        let (status, body) = send(app, get("/api/users/u1/settings")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_settings_merge_write() {
        let (app, _store) = create_test_app();

        let first = json!({"farmLocation": {"lat": 44.1, "lng": -79.9}, "displayName": "North field"});
        let (status, body) = send(
            app.clone(),
            with_json("POST", "/api/users/u1/settings", first.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "message": "Settings updated"}));

        let second = json!({"farmLocation": {"lat": 45.0}});
        let (status, _) = send(
            app.clone(),
            with_json("PUT", "/api/users/u1/settings", second.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, get("/api/users/u1/settings")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["farmLocation"]["lat"], 45.0);
        assert_eq!(body["data"]["farmLocation"]["lng"], -79.9);
        assert_eq!(body["data"]["displayName"], "North field");
        assert!(body["data"]["updated_ts"].is_i64());
    }

    #[tokio::test]
    async fn test_settings_rejects_bad_payload() {
        let (app, _store) = create_test_app();

        for payload in ["not json", "{}", "[1, 2]"] {
            let (status, body) = send(
                app.clone(),
                with_json("PUT", "/api/users/u1/settings", payload),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert_eq!(body["message"], "Invalid JSON payload");
        }
    }

    #[tokio::test]
    async fn test_settings_rejects_unreadable_merge() {
        let (app, store) = create_test_app();

        let (status, _) = send(
            app.clone(),
            with_json("POST", "/api/users/u2/settings", r#"{"farmLocation": {"lat": 44.0}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app.clone(),
            with_json("PUT", "/api/users/u2/settings", r#"{"farmLocation": "north field"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let settings = store
            .get_settings(&crate::model::Identity::new("u2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settings.farm_location.lat, 44.0);
    }
}
