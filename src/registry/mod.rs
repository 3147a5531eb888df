//! Device registry
//!
//! Turns the configured device list into immutable [`Device`] records with
//! stable ids, UUIDs and precomputed documents. The registry is built once
//! at startup and shared read-only by every listener.

pub mod templates;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};

use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::{Config, ConfigPersister, DeviceEntry, resolve_port};
use crate::{Error, Result};

static ID_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.\s]+").expect("valid regex"));

/// A configured virtual player
#[derive(Debug, Clone)]
pub struct Device {
    /// Store-safe identifier derived from the name
    pub id: String,

    /// Friendly name as configured
    pub name: String,

    /// Stable device UUID (32 hex characters)
    pub uuid: String,

    /// Port of this device's ECP listener
    pub http_port: u16,

    /// Address the listener binds to and advertises
    pub bind_address: Ipv4Addr,

    /// Descriptor document served at `GET /`
    pub descriptor_xml: String,

    /// Application list served at `GET /query/apps`
    pub apps_xml: String,

    /// Discovery response datagram, built once
    pub advertisement: Vec<u8>,
}

impl Device {
    /// Build a device and precompute its documents
    #[must_use]
    pub fn new(name: &str, uuid: String, http_port: u16, bind_address: Ipv4Addr) -> Self {
        Self {
            id: normalize_id(name),
            name: name.to_string(),
            descriptor_xml: templates::descriptor_xml(name, &uuid),
            apps_xml: templates::apps_xml(),
            advertisement: templates::advertisement(&uuid, bind_address, http_port),
            uuid,
            http_port,
            bind_address,
        }
    }

    /// `LOCATION` URL advertised for this device
    #[must_use]
    pub fn location(&self) -> String {
        format!("http://{}:{}/", self.bind_address, self.http_port)
    }
}

/// Collapse runs of dots and whitespace into `_`
#[must_use]
pub fn normalize_id(name: &str) -> String {
    ID_SEPARATORS.replace_all(name, "_").into_owned()
}

/// Generate a new 128-bit device UUID as lowercase hex
///
/// Derived by hashing fresh random bytes, matching the format real players
/// expose in their USN.
#[must_use]
pub fn generate_uuid() -> String {
    let mut seed = [0u8; 256];
    rand::thread_rng().fill_bytes(&mut seed);
    let digest = Sha256::digest(seed);
    hex::encode(&digest[..16])
}

/// Return the persisted UUID of an entry, generating one if absent
///
/// The boolean is `true` when a new UUID was written into the entry and the
/// configuration therefore needs persisting.
pub fn get_or_assign_uuid(entry: &mut DeviceEntry) -> (String, bool) {
    match entry.uuid.as_deref().map(str::trim) {
        Some(uuid) if !uuid.is_empty() => (uuid.to_string(), false),
        _ => {
            let uuid = generate_uuid();
            entry.uuid = Some(uuid.clone());
            (uuid, true)
        }
    }
}

/// Ordered set of configured devices
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
    config_dirty: bool,
}

impl DeviceRegistry {
    /// Build the registry from configuration
    ///
    /// Entries without a name, or whose name normalizes to an id already
    /// taken, are configuration errors: they are logged and skipped so the
    /// remaining devices still start. Missing UUIDs are generated and
    /// written into `config.file`; call [`Self::persist`] afterwards to save
    /// them.
    #[must_use]
    pub fn load(config: &mut Config) -> Self {
        let bind = config.bind;
        let mut devices = Vec::with_capacity(config.file.devices.len());
        let mut seen = HashSet::new();
        let mut config_dirty = false;

        for (index, entry) in config.file.devices.iter_mut().enumerate() {
            // Blank names count as missing; others are used verbatim
            let name = match entry.name.as_deref() {
                Some(name) if !name.trim().is_empty() => name.to_string(),
                _ => {
                    let err = Error::Config(format!("device #{index} has no name"));
                    tracing::warn!(error = %err, "skipping device");
                    continue;
                }
            };

            let id = normalize_id(&name);
            if !seen.insert(id.clone()) {
                let err = Error::Config(format!("device '{name}' duplicates id '{id}'"));
                tracing::warn!(error = %err, "skipping device");
                continue;
            }

            let (uuid, generated) = get_or_assign_uuid(entry);
            if generated {
                tracing::info!(device = %id, "generated new device uuid");
            }
            config_dirty |= generated;

            let port = resolve_port(entry.port.as_ref());
            let device = Device::new(&name, uuid, port, bind);
            tracing::debug!(device = %device.id, port, uuid = %device.uuid, "registered device");
            devices.push(Arc::new(device));
        }

        Self {
            devices,
            config_dirty,
        }
    }

    /// Build a registry from ready-made devices
    #[must_use]
    pub fn from_devices(devices: Vec<Device>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
            config_dirty: false,
        }
    }

    /// Save the configuration once if any UUID was generated
    ///
    /// # Errors
    ///
    /// Returns error if the persister fails
    pub fn persist(&mut self, config: &Config, persister: &dyn ConfigPersister) -> Result<()> {
        if !self.config_dirty {
            return Ok(());
        }
        persister.save(&config.file)?;
        self.config_dirty = false;
        Ok(())
    }

    /// Whether generated UUIDs are waiting to be persisted
    #[must_use]
    pub const fn needs_persist(&self) -> bool {
        self.config_dirty
    }

    /// Iterate devices in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    /// Look up a device by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Device>> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
