//! REST server and comparison dashboard.
//!
//! Thin HTTP surface over the search dispatcher:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Run one strategy, return ranked results |
//! | `POST` | `/compare` | Run all strategies side by side (cached) |
//! | `GET`  | `/` | Browser dashboard for strategy comparison |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses are JSON: `{ "error": { "code": "...", "message": "..." } }`.
//! Validation problems return 422 with a descriptive message; internal
//! failures return 500 with a generic message — full detail goes to stderr
//! only, never to the client.
//!
//! # Authentication
//!
//! When the environment variable named by `server.api_key_env` (default
//! `API_KEY`) is set, every `/search` and `/compare` request must carry its
//! value in the `X-API-Key` header. When unset, auth is disabled for local
//! development.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::ComparisonCache;
use crate::config::Config;
use crate::error::SearchError;
use crate::models::{ComparisonEntry, SearchResult};
use crate::remote::{HttpKbClient, KbClient};
use crate::search;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    client: Arc<dyn KbClient>,
    cache: Arc<Mutex<ComparisonCache>>,
    /// Expected `X-API-Key` value, if auth is enabled.
    api_key: Option<String>,
}

/// Start the REST server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let client = HttpKbClient::new(&config.remote)?;
    let api_key = std::env::var(&config.server.api_key_env).ok();
    if api_key.is_none() {
        eprintln!(
            "warning: {} not set, API authentication disabled",
            config.server.api_key_env
        );
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        client: Arc::new(client),
        cache: Arc::new(Mutex::new(ComparisonCache::new(config.cache.capacity))),
        api_key,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_dashboard))
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/compare", post(handle_compare))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    println!("kb-bridge server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn invalid_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "invalid_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "Invalid or missing API key".to_string(),
    }
}

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "An internal error occurred".to_string(),
    }
}

/// Map a search error to an HTTP response. Validation detail is safe to
/// echo; execution detail is logged server-side and replaced with a generic
/// message.
fn classify_search_error(err: SearchError) -> AppError {
    if err.is_validation() {
        invalid_request(err.to_string())
    } else {
        eprintln!("search error: {:#}", anyhow::Error::new(err));
        internal_error()
    }
}

fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = &state.api_key else {
        return Ok(());
    };
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET / ============

async fn handle_dashboard() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_type")]
    search_type: String,
}

fn default_search_type() -> String {
    "merged".to_string()
}

async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    check_api_key(&state, &headers)?;

    let results = search::dispatch_named(
        state.client.as_ref(),
        &state.config.search,
        &request.query,
        &request.search_type,
    )
    .await
    .map_err(classify_search_error)?;

    Ok(Json(results))
}

// ============ POST /compare ============

#[derive(Deserialize)]
struct CompareRequest {
    query: String,
}

#[derive(Serialize)]
struct CompareResponse {
    query: String,
    cached: bool,
    strategies: ComparisonEntry,
}

async fn handle_compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    check_api_key(&state, &headers)?;

    {
        let mut cache = state.cache.lock().await;
        if let Some(entry) = cache.get(&request.query) {
            return Ok(Json(CompareResponse {
                query: request.query.clone(),
                cached: true,
                strategies: entry.clone(),
            }));
        }
    }

    let entry = search::compare(state.client.as_ref(), &state.config.search, &request.query)
        .await
        .map_err(classify_search_error)?;

    state.cache.lock().await.put(&request.query, entry.clone());

    Ok(Json(CompareResponse {
        query: request.query,
        cached: false,
        strategies: entry,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchStrategy;

    #[test]
    fn validation_errors_map_to_422_with_detail() {
        let err = classify_search_error(SearchError::UnknownStrategy("bogus".to_string()));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("bogus"));

        let err = classify_search_error(SearchError::EmptyQuery);
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn execution_errors_map_to_generic_500() {
        let err = classify_search_error(SearchError::Execution {
            strategy: SearchStrategy::Semantic,
            source: anyhow::anyhow!("connection refused to 10.0.0.7"),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        // No internal detail leaks to the client.
        assert!(!err.message.contains("10.0.0.7"));
    }
}
