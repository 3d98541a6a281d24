//! Extension admin endpoints

use super::dto::{
    clamp_pagination, ApiResponse, ChangePasswordRequest, CreateExtensionRequest,
    ExtensionListResponse, ListExtensionsQuery, UpdateExtensionRequest,
};
use super::{status_for, AppState};
use crate::domain::extension::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};

/// GET /api/v1/extensions
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListExtensionsQuery>,
) -> (StatusCode, Json<ApiResponse<ExtensionListResponse>>) {
    let (page, per_page) = clamp_pagination(query.page, query.per_page);
    let filter = query.filter();

    match state.extensions.list(filter, page, per_page).await {
        Ok((extensions, total)) => (
            StatusCode::OK,
            Json(ApiResponse::success(ExtensionListResponse {
                extensions,
                total,
                page,
                per_page,
            })),
        ),
        Err(e) => {
            error!("failed to list extensions: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// POST /api/v1/extensions
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateExtensionRequest>,
) -> (StatusCode, Json<ApiResponse<Extension>>) {
    let data = match req.validate() {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    // The owning domain must exist before we hand its id to the trigger.
    match state.extensions.get_domain(data.domain_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!(
                    "domain {} not found",
                    data.domain_id
                ))),
            );
        }
        Err(e) => {
            error!("domain lookup failed: {}", e);
            return (status_for(&e), Json(ApiResponse::error(e.to_string())));
        }
    }

    match state.extensions.create(data).await {
        Ok(ext) => {
            info!("api: created extension {} (id={})", ext.extension, ext.id);
            (StatusCode::CREATED, Json(ApiResponse::success(ext)))
        }
        Err(e) => {
            error!("failed to create extension: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// GET /api/v1/extensions/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Extension>>) {
    match state.extensions.get_by_id(id).await {
        Ok(Some(ext)) => (StatusCode::OK, Json(ApiResponse::success(ext))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("extension {} not found", id))),
        ),
        Err(e) => {
            error!("failed to get extension {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// PUT /api/v1/extensions/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateExtensionRequest>,
) -> (StatusCode, Json<ApiResponse<Extension>>) {
    let data = match req.validate() {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    match state.extensions.update(id, data).await {
        Ok(ext) => {
            // The switch must re-read fresh settings on its next lookup.
            state.directory.invalidate(&ext.extension, &ext.domain);
            (StatusCode::OK, Json(ApiResponse::success(ext)))
        }
        Err(e) => {
            error!("failed to update extension {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// DELETE /api/v1/extensions/{id} - soft delete.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let existing = match state.extensions.get_by_id(id).await {
        Ok(Some(ext)) => ext,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("extension {} not found", id))),
            );
        }
        Err(e) => {
            error!("failed to get extension {}: {}", id, e);
            return (status_for(&e), Json(ApiResponse::error(e.to_string())));
        }
    };

    match state.extensions.deactivate(id).await {
        Ok(()) => {
            state
                .directory
                .invalidate(&existing.extension, &existing.domain);
            info!("api: deactivated extension {} (id={})", existing.extension, id);
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Err(e) => {
            error!("failed to deactivate extension {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// POST /api/v1/extensions/{id}/password
pub async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ChangePasswordRequest>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string())));
    }

    match state.extensions.update_password(id, &req.sip_password).await {
        Ok(()) => {
            // Invalidate so the next REGISTER sees the new digests.
            if let Ok(Some(ext)) = state.extensions.get_by_id(id).await {
                state.directory.invalidate(&ext.extension, &ext.domain);
            }
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Err(e) => {
            error!("failed to update extension {} password: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}
