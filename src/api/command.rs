//! Command intake
//!
//! Commands are fire-and-forget: the response is an empty `200` whatever
//! the outcome, and store errors are only logged.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use super::{EcpState, query};
use crate::Error;

/// Fallback for every request without a dedicated route
///
/// The body is buffered in full before responding even though it is unused,
/// so clients that stream a body are not cut off.
pub async fn command_or_query(
    State(state): State<Arc<EcpState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    tracing::debug!(
        device = %state.device.id,
        %method,
        path = uri.path(),
        body_len = body.len(),
        "ECP request"
    );

    if method == Method::GET {
        return query::empty();
    }

    let path = uri.path().to_string();
    let device = state.device.id.clone();
    let dispatcher = Arc::clone(&state.dispatcher);
    tokio::spawn(async move {
        match dispatcher.handle_path(&device, &path).await {
            Ok(()) | Err(Error::Protocol(_)) => {}
            Err(e) => {
                tracing::debug!(device = %device, path = %path, error = %e, "command aborted");
            }
        }
    });

    StatusCode::OK.into_response()
}
