//! Applies interpreted commands to the state store

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::{Channel, Command, PULSE_DURATION, Transition, interpret};
use crate::store::{SharedStore, StateDefinition, StateHints, StateId, StateValue};
use crate::{Error, Result};

/// Executes commands for every device against one store
///
/// Keeps a cache of state objects known to exist so repeated commands skip
/// the lookup round-trip. The cache is never invalidated; objects removed
/// from the store behind the emulator's back are not recreated until restart.
///
/// A second command for the same key while a pulse is pending is not
/// serialized against the pending reversion; the later write wins.
pub struct Dispatcher {
    store: SharedStore,
    known: Mutex<HashSet<StateId>>,
    pulse: Duration,
}

impl Dispatcher {
    /// Create a dispatcher using the standard pulse length
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self::with_pulse(store, PULSE_DURATION)
    }

    /// Create a dispatcher with a custom pulse length
    #[must_use]
    pub fn with_pulse(store: SharedStore, pulse: Duration) -> Self {
        Self {
            store,
            known: Mutex::new(HashSet::new()),
            pulse,
        }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Interpret a request path and execute it for `device`
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for unrecognized paths and `Error::Store`
    /// if the state transition was aborted
    pub async fn handle_path(&self, device: &str, path: &str) -> Result<()> {
        let Some(command) = interpret(path) else {
            tracing::debug!(device, path, "unknown command");
            return Err(Error::Protocol(format!("unknown command: {path}")));
        };
        self.execute(device, &command).await
    }

    /// Execute a command, including the delayed reversion of a pulse
    ///
    /// A pulse whose initial write fails is not reverted.
    ///
    /// # Errors
    ///
    /// Returns the store error that aborted the transition
    pub async fn execute(&self, device: &str, command: &Command) -> Result<()> {
        let policy = command.policy();
        tracing::debug!(
            device,
            category = %command.category,
            item = %command.item,
            "executing command"
        );

        match policy.transition {
            Transition::Latch(value) => {
                self.set_state(device, policy.channel, &command.item, value)
                    .await
            }
            Transition::Pulse => {
                self.set_state(device, policy.channel, &command.item, true)
                    .await?;
                tokio::time::sleep(self.pulse).await;
                self.set_state(device, policy.channel, &command.item, false)
                    .await
            }
        }
    }

    /// Write an acknowledged value, creating the state object on first use
    ///
    /// # Errors
    ///
    /// Returns error if the lookup, creation or write fails; nothing is
    /// written when the lookup fails
    pub async fn set_state(
        &self,
        device: &str,
        channel: Channel,
        item: &str,
        value: bool,
    ) -> Result<()> {
        let id = StateId::new(device, channel.as_str(), item);

        if self.is_known(&id) {
            tracing::trace!(state = %id, "state cached, writing value");
            return self.write(&id, value).await;
        }

        let existing = self
            .store
            .get_object(&id)
            .await
            .inspect_err(|e| tracing::debug!(state = %id, error = %e, "state lookup failed"))?;

        if existing.is_none() {
            tracing::debug!(state = %id, "creating new state");
            let definition = StateDefinition::indicator(item);
            let hints = StateHints {
                url: format!("{channel}/{item}"),
            };
            self.store.create_state(&id, &definition, &hints).await?;
        }

        self.write(&id, value).await?;
        self.mark_known(id);
        Ok(())
    }

    async fn write(&self, id: &StateId, value: bool) -> Result<()> {
        self.store
            .set_state(id, StateValue::acked(value))
            .await
            .inspect_err(|e| tracing::warn!(state = %id, value, error = %e, "state write failed"))
    }

    fn is_known(&self, id: &StateId) -> bool {
        self.known.lock().is_ok_and(|known| known.contains(id))
    }

    fn mark_known(&self, id: StateId) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(id);
        }
    }
}
