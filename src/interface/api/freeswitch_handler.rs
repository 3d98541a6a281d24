//! Softswitch XML_CURL endpoints
//!
//! These handlers never surface an error status: any parse, validation,
//! or lookup failure answers 200 with the canonical not-found document.
//! A non-200 would make the switch retry the same request and amplify
//! load, while the not-found document is treated as authoritative.

use super::AppState;
use crate::interface::xmlcurl::{
    ConfigurationRequest, DialplanRequest, DirectoryRequest, NOT_FOUND_XML,
};
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Form;
use tracing::info;

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn not_found() -> Response {
    xml_response(NOT_FOUND_XML.to_string())
}

/// POST /freeswitch/directory
pub async fn directory(
    State(state): State<AppState>,
    form: Result<Form<DirectoryRequest>, FormRejection>,
) -> Response {
    let Ok(Form(mut req)) = form else {
        info!("failed to parse directory request");
        return not_found();
    };
    req.normalize();
    if let Err(e) = req.validate() {
        info!("invalid directory request: {}", e);
        return not_found();
    }

    xml_response(state.directory.handle(&req).await)
}

/// POST /freeswitch/dialplan
pub async fn dialplan(
    State(state): State<AppState>,
    form: Result<Form<DialplanRequest>, FormRejection>,
) -> Response {
    let Ok(Form(mut req)) = form else {
        info!("failed to parse dialplan request");
        return not_found();
    };
    req.normalize();
    if let Err(e) = req.validate() {
        info!("invalid dialplan request: {}", e);
        return not_found();
    }

    xml_response(state.dialplan.handle(&req).await)
}

/// POST /freeswitch/configuration
pub async fn configuration(
    State(state): State<AppState>,
    form: Result<Form<ConfigurationRequest>, FormRejection>,
) -> Response {
    let Ok(Form(req)) = form else {
        info!("failed to parse configuration request");
        return not_found();
    };
    if let Err(e) = req.validate() {
        info!("invalid configuration request: {}", e);
        return not_found();
    }

    xml_response(state.configuration.handle(&req).await)
}
