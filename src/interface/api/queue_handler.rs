//! Queue and queue-agent admin endpoints

use super::dto::{
    ApiResponse, CreateQueueAgentRequest, CreateQueueRequest, ListQueuesQuery, QueueListResponse,
    UpdateQueueAgentRequest, UpdateQueueRequest,
};
use super::{status_for, AppState};
use crate::domain::queue::{Queue, QueueAgent};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info};

/// GET /api/v1/queues
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQueuesQuery>,
) -> (StatusCode, Json<ApiResponse<QueueListResponse>>) {
    match state.queues.list(query.domain_id, query.active).await {
        Ok(queues) => (
            StatusCode::OK,
            Json(ApiResponse::success(QueueListResponse { queues })),
        ),
        Err(e) => {
            error!("failed to list queues: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// POST /api/v1/queues
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateQueueRequest>,
) -> (StatusCode, Json<ApiResponse<Queue>>) {
    let data = match req.validate() {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

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

    match state.queues.create(data).await {
        Ok(queue) => {
            info!("api: created queue {} (id={})", queue.name, queue.id);
            (StatusCode::CREATED, Json(ApiResponse::success(queue)))
        }
        Err(e) => {
            error!("failed to create queue: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// GET /api/v1/queues/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Queue>>) {
    match state.queues.get(id).await {
        Ok(Some(queue)) => (StatusCode::OK, Json(ApiResponse::success(queue))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("queue {} not found", id))),
        ),
        Err(e) => {
            error!("failed to get queue {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// PUT /api/v1/queues/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateQueueRequest>,
) -> (StatusCode, Json<ApiResponse<Queue>>) {
    let data = match req.validate() {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    match state.queues.update(id, data).await {
        Ok(queue) => (StatusCode::OK, Json(ApiResponse::success(queue))),
        Err(e) => {
            error!("failed to update queue {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// DELETE /api/v1/queues/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    match state.queues.delete(id).await {
        Ok(()) => {
            info!("api: deleted queue {}", id);
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Err(e) => {
            error!("failed to delete queue {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    pub active: Option<bool>,
}

/// GET /api/v1/queues/{id}/agents
pub async fn list_agents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ListAgentsQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<QueueAgent>>>) {
    match state.queues.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("queue {} not found", id))),
            );
        }
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }

    match state.queues.list_agents(id, query.active).await {
        Ok(agents) => (StatusCode::OK, Json(ApiResponse::success(agents))),
        Err(e) => {
            error!("failed to list agents for queue {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// POST /api/v1/queues/{id}/agents
pub async fn add_agent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateQueueAgentRequest>,
) -> (StatusCode, Json<ApiResponse<QueueAgent>>) {
    let data = match req.validate(id) {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    match state.queues.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("queue {} not found", id))),
            );
        }
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }

    match state.extensions.get_by_id(data.extension_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!(
                    "extension {} not found",
                    data.extension_id
                ))),
            );
        }
        Err(e) => return (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }

    match state.queues.add_agent(data).await {
        Ok(agent) => {
            info!("api: added agent {} to queue {}", agent.extension_id, id);
            (StatusCode::CREATED, Json(ApiResponse::success(agent)))
        }
        Err(e) => {
            error!("failed to add agent to queue {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// PUT /api/v1/queue-agents/{id}
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateQueueAgentRequest>,
) -> (StatusCode, Json<ApiResponse<QueueAgent>>) {
    let data = match req.validate() {
        Ok(data) => data,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    match state.queues.update_agent(id, data).await {
        Ok(agent) => (StatusCode::OK, Json(ApiResponse::success(agent))),
        Err(e) => {
            error!("failed to update queue agent {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// DELETE /api/v1/queue-agents/{id}
pub async fn remove_agent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    match state.queues.remove_agent(id).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))),
        Err(e) => {
            error!("failed to remove queue agent {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}
