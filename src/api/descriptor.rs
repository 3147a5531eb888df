//! Device descriptor endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::{EcpState, XML_CONTENT_TYPE};

/// `GET /` - UPnP device description
pub async fn device_descriptor(State(state): State<Arc<EcpState>>) -> impl IntoResponse {
    tracing::debug!(device = %state.device.id, "sending service description");
    (
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        state.device.descriptor_xml.clone(),
    )
}
