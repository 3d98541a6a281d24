//! CDR endpoints: ingest (from the switch) and admin queries

use super::dto::{clamp_pagination, ApiResponse, CdrListResponse};
use super::{status_for, AppState};
use crate::domain::cdr::{CallDirection, Cdr, CdrListRequest, CdrStats};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    pub uuid: Option<String>,
}

/// POST /api/v1/cdr?uuid={uuid} with the raw CDR XML body.
///
/// Replies 202 as soon as the row is staged; parsing and persistence into
/// the final table happen on the worker. Duplicate UUIDs are harmless.
pub async fn ingest(
    State(state): State<AppState>,
    Query(query): Query<IngestQuery>,
    body: String,
) -> Response {
    let uuid = match query.uuid.as_deref() {
        Some(uuid) if !uuid.is_empty() => uuid,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error("uuid is required".to_string())),
            )
                .into_response();
        }
    };

    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error("empty request body".to_string())),
        )
            .into_response();
    }

    match state.cdrs.enqueue_raw(uuid, &body).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            error!("failed to stage cdr {}: {}", uuid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("failed to queue cdr".to_string())),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListCdrsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub caller_id: Option<String>,
    pub destination_number: Option<String>,
    pub direction: Option<String>,
    pub hangup_cause: Option<String>,
    pub queue_id: Option<i64>,
    pub min_duration: Option<i32>,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

/// GET /api/v1/cdr
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListCdrsQuery>,
) -> (StatusCode, Json<ApiResponse<CdrListResponse>>) {
    let (page, per_page) = clamp_pagination(query.page, query.per_page);
    let req = CdrListRequest {
        start_date: query.start_date,
        end_date: query.end_date,
        caller_id_number: query.caller_id,
        destination_number: query.destination_number,
        direction: query.direction.as_deref().and_then(CallDirection::parse),
        hangup_cause: query.hangup_cause,
        queue_id: query.queue_id,
        min_duration: query.min_duration,
        page,
        per_page,
    };

    match state.cdrs.list(req).await {
        Ok((cdrs, total)) => (
            StatusCode::OK,
            Json(ApiResponse::success(CdrListResponse {
                cdrs,
                total,
                page,
                per_page,
            })),
        ),
        Err(e) => {
            error!("failed to list cdrs: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// GET /api/v1/cdr/{uuid}
pub async fn get(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> (StatusCode, Json<ApiResponse<Cdr>>) {
    info!("api: getting cdr {}", uuid);

    match state.cdrs.get_by_uuid(&uuid).await {
        Ok(Some(cdr)) => (StatusCode::OK, Json(ApiResponse::success(cdr))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("cdr {} not found", uuid))),
        ),
        Err(e) => {
            error!("failed to get cdr {}: {}", uuid, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// GET /api/v1/cdr/stats - defaults to the last 24 hours.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> (StatusCode, Json<ApiResponse<CdrStats>>) {
    let end = query.end_date.unwrap_or_else(Utc::now);
    let start = query.start_date.unwrap_or(end - Duration::hours(24));

    match state.cdrs.stats(start, end).await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::success(stats))),
        Err(e) => {
            error!("failed to get cdr stats: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}
