//! HTTP boundary for the recommendation service.
//!
//! Routes:
//! - `GET /` service information
//! - `GET /docs` endpoint listing
//! - `GET /health` liveness plus store sizes
//! - `GET /api/v1/recommendations/:user_id?limit=N`
//!
//! Request validation lives here: `limit` must fall within
//! `[1, max_limit]`, and malformed path or query values are answered with
//! `422`. Ranking is CPU work and runs on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::orchestrator::{Recommendation, RecommendationService};
use data_loader::UserId;

pub const API_PREFIX: &str = "/api/v1";
const SERVICE_NAME: &str = "Reel Recs API";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecommendationService>,
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    docs_url: &'static str,
    api_prefix: &'static str,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    users: usize,
    items: usize,
}

/// Errors a handler can answer with
#[derive(Debug)]
pub enum ApiError {
    /// Bad path or query values (422)
    Validation(String),
    /// Contract violations inside the service (500)
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error generating recommendations: {detail}"),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the application router
pub fn router(service: Arc<RecommendationService>, cors_origins: &[String]) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/", get(service_info))
        .route("/docs", get(docs))
        .route("/health", get(health_check))
        .route(
            &format!("{API_PREFIX}/recommendations/:user_id"),
            get(get_recommendations),
        )
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow the configured origins, or any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        docs_url: "/docs",
        api_prefix: API_PREFIX,
    })
}

async fn docs() -> Json<serde_json::Value> {
    Json(json!({
        "endpoints": [
            { "method": "GET", "path": "/", "description": "Service information" },
            { "method": "GET", "path": "/health", "description": "Liveness and store sizes" },
            {
                "method": "GET",
                "path": format!("{API_PREFIX}/recommendations/{{user_id}}"),
                "description": "Top recommendations for a user",
                "query": { "limit": "Number of recommendations to return (default 10, max 50)" }
            }
        ]
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        users: state.service.user_count(),
        items: state.service.item_count(),
    })
}

async fn get_recommendations(
    State(state): State<AppState>,
    path: Result<Path<UserId>, PathRejection>,
    query: Result<Query<RecommendationQuery>, QueryRejection>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let Path(user_id) = path.map_err(|e| ApiError::Validation(e.body_text()))?;
    let Query(params) = query.map_err(|e| ApiError::Validation(e.body_text()))?;

    let config = state.service.config();
    let limit = match params.limit {
        None => config.default_limit,
        Some(limit) if limit >= 1 && limit as u64 <= config.max_limit as u64 => limit as usize,
        Some(limit) => {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and {}, got {}",
                config.max_limit, limit
            )));
        }
    };

    let service = Arc::clone(&state.service);
    let recommendations =
        tokio::task::spawn_blocking(move || service.get_recommendations(user_id, limit))
            .await
            .map_err(|e| ApiError::Internal(format!("ranking task failed: {e}")))?
            .map_err(|e| {
                error!("Failed to get recommendations for user {}: {}", user_id, e);
                ApiError::Internal(e.to_string())
            })?;

    Ok(Json(RecommendationResponse {
        recommendations,
        method: "svd",
    }))
}
