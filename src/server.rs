use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregator;
use crate::cache::{Cache, CacheStats, DEFAULT_TTL};
use crate::models::Event;
use crate::sources::EventSource;

pub struct AppState {
    pub cache: Arc<Cache<Vec<Event>>>,
    pub sources: Vec<Arc<dyn EventSource>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Query parameter \"q\" is required")]
    MissingQuery,
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingQuery => {
                let body = serde_json::json!({ "error": self.to_string() });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Internal(message) => {
                let body = serde_json::json!({
                    "error": "Search failed",
                    "message": message,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    location: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    cache: CacheStats,
}

#[derive(Debug, serde::Serialize)]
struct SearchResponse {
    events: Vec<Event>,
    total: usize,
    cached: String,
    query: String,
    location: String,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        cache: state.cache.stats().await,
    })
}

async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::MissingQuery)?
        .to_string();
    let location = params.location.unwrap_or_else(|| "London".to_string());

    info!(%query, %location, "searching events");
    let cache_key = Cache::<Vec<Event>>::key(&["search", &query, &location]);

    let state_for_fetch = Arc::clone(&state);
    let key_for_fetch = cache_key.clone();
    let query_for_fetch = query.clone();
    let location_for_fetch = location.clone();
    // A defect inside the pipeline surfaces as a JoinError here and becomes
    // a 500 instead of tearing down the connection task.
    let events = tokio::spawn(async move {
        state_for_fetch
            .cache
            .get_or_fetch(&key_for_fetch, DEFAULT_TTL, || {
                aggregator::aggregate(
                    &query_for_fetch,
                    &location_for_fetch,
                    &state_for_fetch.sources,
                )
            })
            .await
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    info!(count = events.len(), "returning events");
    Ok(Json(SearchResponse {
        total: events.len(),
        events,
        cached: cache_key,
        query,
        location,
    }))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/events/search", get(search_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind error: {0}")]
    Bind(String),
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind and serve until the process is terminated.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), ServerError> {
    let router = build_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| ServerError::Bind(format!("bind failed on {addr}: {err}")))?;

    info!(%addr, "event-scout listening");

    axum::serve(listener, router)
        .await
        .map_err(|err| ServerError::Serve(err.to_string()))?;

    Ok(())
}
