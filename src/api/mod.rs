//! ECP command/query server
//!
//! One HTTP listener per device. `GET /` serves the device descriptor,
//! `GET /query/...` answers read-only queries, and any other method is
//! treated as a command and acknowledged with an empty `200`.

pub mod command;
pub mod descriptor;
pub mod query;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::command::Dispatcher;
use crate::registry::Device;
use crate::shutdown::wait_for_shutdown;
use crate::{Error, Result};

/// Content type of every XML response
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Shared state for one device's handlers
#[derive(Clone)]
pub struct EcpState {
    pub device: Arc<Device>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Lifecycle of a device listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Listening,
}

/// Build the ECP router for one device
#[must_use]
pub fn router(state: Arc<EcpState>) -> Router {
    Router::new()
        .route(
            "/",
            get(descriptor::device_descriptor).fallback(command::command_or_query),
        )
        .route(
            "/query/apps",
            get(query::apps).fallback(command::command_or_query),
        )
        .fallback(command::command_or_query)
        .with_state(state)
        // Bodies are buffered whatever their size
        .layer(DefaultBodyLimit::disable())
        .layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// HTTP listener for one device
pub struct EcpServer {
    state: Arc<EcpState>,
    addr: SocketAddr,
    status: watch::Sender<ListenerState>,
}

impl EcpServer {
    /// Create a server bound to the device's address and port
    #[must_use]
    pub fn new(device: Arc<Device>, dispatcher: Arc<Dispatcher>) -> Self {
        let addr = SocketAddr::from((device.bind_address, device.http_port));
        let (status, _) = watch::channel(ListenerState::Stopped);
        Self {
            state: Arc::new(EcpState { device, dispatcher }),
            addr,
            status,
        }
    }

    /// Observe lifecycle transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.status.subscribe()
    }

    /// Address this server binds to
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the TCP listener
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the port cannot be bound
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.addr).await.map_err(|e| {
            tracing::error!(
                device = %self.state.device.id,
                addr = %self.addr,
                error = %e,
                "failed to bind ECP listener"
            );
            Error::Transport(format!("failed to bind {}: {e}", self.addr))
        })
    }

    /// Serve requests until shutdown or a listener error
    ///
    /// In-flight requests are dropped on shutdown, not drained.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the listener fails; it is not restarted
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let device = self.state.device.id.clone();
        let local = listener.local_addr().unwrap_or(self.addr);
        self.status.send_replace(ListenerState::Listening);
        tracing::debug!(device = %device, addr = %local, "HTTP server started");

        let app = router(Arc::clone(&self.state));
        let result = tokio::select! {
            served = axum::serve(listener, app).into_future() => served,
            _ = wait_for_shutdown(&mut shutdown) => Ok(()),
        };

        self.status.send_replace(ListenerState::Stopped);
        match result {
            Ok(()) => {
                tracing::debug!(device = %device, "HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(device = %device, error = %e, "HTTP server error");
                Err(Error::Transport(format!("listener for {device} failed: {e}")))
            }
        }
    }

    /// Bind and serve until shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` on bind or listener failure
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Run the server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
