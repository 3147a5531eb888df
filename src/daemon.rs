//! Daemon - the emulator service
//!
//! Builds the device registry, aligns the state store with it, then runs one
//! ECP listener per device plus the shared discovery responder until
//! interrupted.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::api::EcpServer;
use crate::command::Dispatcher;
use crate::config::ConfigPersister;
use crate::discovery::{DiscoveryConfig, DiscoveryResponder};
use crate::registry::DeviceRegistry;
use crate::store::{self, SharedStore};
use crate::{Config, Result, shutdown};

/// The fakeroku daemon
pub struct Daemon {
    config: Config,
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl Daemon {
    /// Create a daemon instance
    ///
    /// Generated device UUIDs are saved through `persister` and store devices
    /// are synchronized with the configuration. Failures of either step are
    /// logged and startup continues.
    pub async fn new(
        mut config: Config,
        store: SharedStore,
        persister: Option<&dyn ConfigPersister>,
    ) -> Self {
        let mut registry = DeviceRegistry::load(&mut config);

        if registry.needs_persist() {
            match persister {
                Some(persister) => {
                    if let Err(e) = registry.persist(&config, persister) {
                        tracing::warn!(error = %e, "failed to save generated device uuids");
                    }
                }
                None => tracing::warn!("no config file to save generated device uuids to"),
            }
        }

        match store::sync_devices(store.as_ref(), &registry).await {
            Ok(report) => tracing::info!(
                created = report.created.len(),
                deleted = report.deleted.len(),
                kept = report.kept.len(),
                "state store synchronized"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to synchronize state store"),
        }

        Self {
            config,
            registry: Arc::new(registry),
            dispatcher: Arc::new(Dispatcher::new(store)),
        }
    }

    /// Configured devices
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Command dispatcher shared by all listeners
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Effective configuration, including generated UUIDs
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run the daemon until Ctrl-C
    ///
    /// # Errors
    ///
    /// Never fails today; listener errors are logged
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await
    }

    /// Run the daemon until `signal` completes
    ///
    /// Listeners that fail to bind or die later are logged and stay down;
    /// the rest keep running.
    ///
    /// # Errors
    ///
    /// Never fails today; listener errors are logged
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        if self.registry.is_empty() {
            tracing::warn!("no devices configured");
        }

        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let mut handles: Vec<(String, JoinHandle<Result<()>>)> = Vec::new();

        for device in self.registry.iter() {
            tracing::info!(
                device = %device.id,
                name = %device.name,
                location = %device.location(),
                "starting device"
            );
            let server = EcpServer::new(Arc::clone(device), Arc::clone(&self.dispatcher));
            handles.push((device.id.clone(), server.spawn(shutdown_rx.clone())));
        }

        let responder = DiscoveryResponder::new(
            Arc::clone(&self.registry),
            DiscoveryConfig::from_config(&self.config),
        );
        handles.push((
            "discovery".to_string(),
            tokio::spawn(responder.run(shutdown_rx)),
        ));

        tracing::info!(devices = self.registry.len(), "daemon running");
        signal.await;
        tracing::info!("shutdown requested");
        shutdown_tx.send_replace(true);

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(listener = %name, error = %e, "listener exited with error");
                }
                Err(e) => tracing::error!(listener = %name, error = %e, "listener task panicked"),
            }
        }

        tracing::info!("daemon stopped");
        Ok(())
    }
}
