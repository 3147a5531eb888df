//! Read-only ECP queries

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::{EcpState, XML_CONTENT_TYPE};

/// `GET /query/apps` - installed application list
pub async fn apps(State(state): State<Arc<EcpState>>) -> impl IntoResponse {
    tracing::debug!(device = %state.device.id, "responding to apps query");
    xml(state.device.apps_xml.clone())
}

/// Any other `GET` - empty document
pub fn empty() -> Response {
    xml(String::new())
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}
