//! API router configuration
//!
//! Three auth tiers: public health checks, Basic-Auth softswitch routes
//! (XML_CURL lookups and CDR ingest), and API-key admin routes.

use super::middleware::{require_api_key, require_basic_auth};
use super::{
    cdr_handler, extension_handler, freeswitch_handler, health_handler, queue_handler, AppState,
};
use crate::config::{CorsConfig, ServerConfig};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, server: &ServerConfig, cors: &CorsConfig) -> Router {
    // Health routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(health_handler::check))
        .route("/health/stats", get(health_handler::stats));

    // Softswitch XML_CURL routes (Basic Auth)
    let freeswitch_routes = Router::new()
        .route("/freeswitch/directory", post(freeswitch_handler::directory))
        .route("/freeswitch/dialplan", post(freeswitch_handler::dialplan))
        .route(
            "/freeswitch/configuration",
            post(freeswitch_handler::configuration),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    // CDR ingest (Basic Auth - posted by the switch at call end)
    let ingest_routes = Router::new()
        .route("/api/v1/cdr", post(cdr_handler::ingest))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    // Admin routes (API key)
    let admin_routes = Router::new()
        .route("/api/v1/cdr", get(cdr_handler::list))
        .route("/api/v1/cdr/stats", get(cdr_handler::stats))
        .route("/api/v1/cdr/:uuid", get(cdr_handler::get))
        .route("/api/v1/extensions", get(extension_handler::list))
        .route("/api/v1/extensions", post(extension_handler::create))
        .route("/api/v1/extensions/:id", get(extension_handler::get))
        .route("/api/v1/extensions/:id", put(extension_handler::update))
        .route("/api/v1/extensions/:id", delete(extension_handler::delete))
        .route(
            "/api/v1/extensions/:id/password",
            post(extension_handler::update_password),
        )
        .route("/api/v1/queues", get(queue_handler::list))
        .route("/api/v1/queues", post(queue_handler::create))
        .route("/api/v1/queues/:id", get(queue_handler::get))
        .route("/api/v1/queues/:id", put(queue_handler::update))
        .route("/api/v1/queues/:id", delete(queue_handler::delete))
        .route("/api/v1/queues/:id/agents", get(queue_handler::list_agents))
        .route("/api/v1/queues/:id/agents", post(queue_handler::add_agent))
        .route("/api/v1/queue-agents/:id", put(queue_handler::update_agent))
        .route(
            "/api/v1/queue-agents/:id",
            delete(queue_handler::remove_agent),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let mut router = Router::new()
        .merge(health_routes)
        .merge(freeswitch_routes)
        .merge(ingest_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.write_timeout_secs,
        )));

    if cors.enabled {
        router = router.layer(cors_layer(cors));
    }

    router
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    let wildcard_origin =
        config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");
    if wildcard_origin {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        layer = layer.allow_origin(AllowOrigin::list(origins));
        if config.allow_credentials {
            layer = layer.allow_credentials(true);
        }
    }

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    layer = if methods.is_empty() {
        layer.allow_methods(Any)
    } else {
        layer.allow_methods(AllowMethods::list(methods))
    };

    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();
    if headers.is_empty() {
        layer.allow_headers(Any)
    } else {
        layer.allow_headers(AllowHeaders::list(headers))
    }
}
