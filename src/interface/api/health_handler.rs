//! Health endpoints (public, no auth)

use super::AppState;
use crate::infrastructure::persistence::health_check;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

const SERVICE_NAME: &str = "squawk";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: String,
    pub cache: String,
}

/// GET /health
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut response = HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        timestamp: Utc::now(),
        database: "ok".to_string(),
        cache: "ok".to_string(),
    };

    if let Err(e) = health_check(&state.pool).await {
        response.status = "degraded".to_string();
        response.database = format!("error: {}", e);
    }

    let status_code = if response.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// GET /health/stats - pool and cache statistics.
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache_stats = state.cache.stats();

    Json(json!({
        "database": {
            "max_open_connections": state.pool.options().get_max_connections(),
            "open_connections": state.pool.size(),
            "idle": state.pool.num_idle(),
        },
        "cache": cache_stats,
    }))
}
