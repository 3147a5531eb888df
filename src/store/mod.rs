//! State store adapter
//!
//! The emulator records every command as a boolean indicator state in an
//! external store. [`StateStore`] is the contract the rest of the crate
//! consumes; [`MemoryStore`] and [`SqliteStore`] are the shipped backends.

pub mod memory;
mod schema;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::Result;
use crate::config::StoreConfig;
use crate::registry::DeviceRegistry;

/// Channels created under every device
pub const DEVICE_CHANNELS: [&str; 2] = ["keys", "apps"];

/// Hierarchical state identifier `device.channel.item`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId {
    pub device: String,
    pub channel: String,
    pub item: String,
}

impl StateId {
    #[must_use]
    pub fn new(
        device: impl Into<String>,
        channel: impl Into<String>,
        item: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            channel: channel.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.device, self.channel, self.item)
    }
}

/// Common part of a state object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    pub def: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub write: bool,
    pub role: String,
}

impl StateDefinition {
    /// Read-only boolean indicator defaulting to `false`
    #[must_use]
    pub fn indicator(name: &str) -> Self {
        Self {
            name: name.to_string(),
            def: false,
            kind: "boolean".to_string(),
            read: true,
            write: false,
            role: "indicator.state".to_string(),
        }
    }
}

/// Store-specific hints attached to a state object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHints {
    /// `channel/item`
    pub url: String,
}

/// A state object as held by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateObject {
    pub id: StateId,
    pub common: StateDefinition,
    pub native: StateHints,
}

/// Value written to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateValue {
    pub val: bool,
    pub ack: bool,
}

impl StateValue {
    /// Acknowledged value, as written by the emulator itself
    #[must_use]
    pub const fn acked(val: bool) -> Self {
        Self { val, ack: true }
    }
}

/// Current value of a state with its last-change timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub val: bool,
    pub ack: bool,
    pub ts: DateTime<Utc>,
}

/// Contract of the external state store
///
/// `create_state` must be idempotent: creating an object that already exists
/// succeeds and leaves the existing object untouched. This is what makes two
/// concurrent first-use commands for the same key converge.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Look up a state object
    async fn get_object(&self, id: &StateId) -> Result<Option<StateObject>>;

    /// Create a state object if it does not exist yet
    async fn create_state(
        &self,
        id: &StateId,
        definition: &StateDefinition,
        hints: &StateHints,
    ) -> Result<()>;

    /// Write a state value
    async fn set_state(&self, id: &StateId, value: StateValue) -> Result<()>;

    /// Read a state value
    async fn get_state(&self, id: &StateId) -> Result<Option<StoredState>>;

    /// List device ids known to the store
    async fn get_devices(&self) -> Result<Vec<String>>;

    /// Create a device object
    async fn create_device(&self, id: &str, name: &str) -> Result<()>;

    /// Create a channel below a device
    async fn create_channel(&self, device: &str, channel: &str) -> Result<()>;

    /// Delete a device together with its channels and states
    async fn delete_device(&self, id: &str) -> Result<()>;
}

/// Shared handle to a store backend
pub type SharedStore = Arc<dyn StateStore>;

/// Open the configured store backend
///
/// # Errors
///
/// Returns error if the `SQLite` database cannot be opened
pub fn open(config: &StoreConfig) -> Result<SharedStore> {
    match config {
        StoreConfig::Memory => {
            tracing::info!("using in-memory state store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Sqlite(path) => {
            if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}

/// Outcome of [`sync_devices`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

/// Align store devices with the registry
///
/// Deletes store devices that are no longer configured and creates missing
/// devices with their `keys` and `apps` channels. Individual failures are
/// logged and skipped.
///
/// # Errors
///
/// Returns error only if the device listing itself fails
pub async fn sync_devices(store: &dyn StateStore, registry: &DeviceRegistry) -> Result<SyncReport> {
    let existing = store.get_devices().await?;
    let mut report = SyncReport::default();

    for id in &existing {
        if registry.get(id).is_some() {
            tracing::debug!(device = %id, "found device");
            report.kept.push(id.clone());
        } else {
            tracing::debug!(device = %id, "deleting old device");
            match store.delete_device(id).await {
                Ok(()) => report.deleted.push(id.clone()),
                Err(e) => tracing::warn!(device = %id, error = %e, "failed to delete old device"),
            }
        }
    }

    for device in registry.iter() {
        if existing.iter().any(|id| *id == device.id) {
            continue;
        }
        tracing::debug!(device = %device.id, "creating device");
        if let Err(e) = create_device_tree(store, &device.id).await {
            tracing::warn!(device = %device.id, error = %e, "failed to create device");
            continue;
        }
        report.created.push(device.id.clone());
    }

    Ok(report)
}

async fn create_device_tree(store: &dyn StateStore, id: &str) -> Result<()> {
    store.create_device(id, id).await?;
    for channel in DEVICE_CHANNELS {
        store.create_channel(id, channel).await?;
    }
    Ok(())
}
