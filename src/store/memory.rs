//! In-process state store

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{StateDefinition, StateHints, StateId, StateObject, StateStore, StateValue, StoredState};
use crate::Result;

/// One recorded write, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub id: StateId,
    pub value: StateValue,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    devices: BTreeMap<String, String>,
    channels: BTreeSet<(String, String)>,
    objects: HashMap<StateId, StateObject>,
    states: HashMap<StateId, StoredState>,
    history: Vec<Transition>,
    creations: usize,
}

/// Store backed by in-memory maps
///
/// Keeps a log of every write so callers can inspect transition order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes so far
    pub async fn history(&self) -> Vec<Transition> {
        self.inner.read().await.history.clone()
    }

    /// Writes to one state so far
    pub async fn history_for(&self, id: &StateId) -> Vec<StateValue> {
        self.inner
            .read()
            .await
            .history
            .iter()
            .filter(|t| t.id == *id)
            .map(|t| t.value)
            .collect()
    }

    /// Number of objects actually created (idempotent repeats excluded)
    pub async fn creations(&self) -> usize {
        self.inner.read().await.creations
    }

    /// Whether a channel exists
    pub async fn has_channel(&self, device: &str, channel: &str) -> bool {
        self.inner
            .read()
            .await
            .channels
            .contains(&(device.to_string(), channel.to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_object(&self, id: &StateId) -> Result<Option<StateObject>> {
        Ok(self.inner.read().await.objects.get(id).cloned())
    }

    async fn create_state(
        &self,
        id: &StateId,
        definition: &StateDefinition,
        hints: &StateHints,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(id) {
            return Ok(());
        }
        inner.objects.insert(
            id.clone(),
            StateObject {
                id: id.clone(),
                common: definition.clone(),
                native: hints.clone(),
            },
        );
        inner.states.entry(id.clone()).or_insert_with(|| StoredState {
            val: definition.def,
            ack: true,
            ts: Utc::now(),
        });
        inner.creations += 1;
        Ok(())
    }

    async fn set_state(&self, id: &StateId, value: StateValue) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.states.insert(
            id.clone(),
            StoredState {
                val: value.val,
                ack: value.ack,
                ts: Utc::now(),
            },
        );
        inner.history.push(Transition {
            id: id.clone(),
            value,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn get_state(&self, id: &StateId) -> Result<Option<StoredState>> {
        Ok(self.inner.read().await.states.get(id).cloned())
    }

    async fn get_devices(&self) -> Result<Vec<String>> {
        Ok(self.inner.read().await.devices.keys().cloned().collect())
    }

    async fn create_device(&self, id: &str, name: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .devices
            .entry(id.to_string())
            .or_insert_with(|| name.to_string());
        Ok(())
    }

    async fn create_channel(&self, device: &str, channel: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .channels
            .insert((device.to_string(), channel.to_string()));
        Ok(())
    }

    async fn delete_device(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.devices.remove(id);
        inner.channels.retain(|(device, _)| device != id);
        inner.objects.retain(|key, _| key.device != id);
        inner.states.retain(|key, _| key.device != id);
        Ok(())
    }
}
