//! HTTP API - routing, middleware, and handlers

pub mod cdr_handler;
pub mod dto;
pub mod extension_handler;
pub mod freeswitch_handler;
pub mod health_handler;
pub mod middleware;
pub mod queue_handler;
pub mod router;

pub use router::build_router;

use crate::config::AuthConfig;
use crate::domain::cdr::CdrRepository;
use crate::domain::extension::ExtensionRepository;
use crate::domain::queue::QueueRepository;
use crate::domain::shared::error::DomainError;
use crate::infrastructure::cache::CacheManager;
use crate::interface::xmlcurl::{ConfigurationHandler, DialplanHandler, DirectoryHandler};
use axum::http::StatusCode;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub extensions: Arc<dyn ExtensionRepository>,
    pub queues: Arc<dyn QueueRepository>,
    pub cdrs: Arc<dyn CdrRepository>,
    pub cache: Arc<CacheManager>,
    pub directory: Arc<DirectoryHandler>,
    pub dialplan: Arc<DialplanHandler>,
    pub configuration: Arc<ConfigurationHandler>,
    pub auth: Arc<AuthConfig>,
    pub pool: PgPool,
}

/// Map a domain error onto the admin API status code. Softswitch routes
/// never use this; they answer 200 regardless.
pub(crate) fn status_for(error: &DomainError) -> StatusCode {
    match error {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Parse(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
