//! TOML configuration file loading and persistence
//!
//! Supports `~/.config/fakeroku/config.toml` as the persistent config source.
//! All top-level fields are optional; the device list defaults to empty.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    /// Multicast group joined by the discovery responder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multicast_ip: Option<String>,

    /// Address every listener binds to and advertises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// State store backend selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreFileConfig>,

    /// Virtual devices to emulate
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// One configured virtual device
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceEntry {
    /// Friendly name, also the source of the device id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// HTTP port, either a number or a numeric string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,

    /// Persisted device UUID, assigned on first start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// Port as written by the user
///
/// Older configs store ports as strings, so both forms are accepted. Any
/// other TOML value still loads; [`super::resolve_port`] replaces it with the
/// default port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Float(f64),
    Text(String),
    Other(toml::Value),
}

/// Store section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreFileConfig {
    /// `"memory"` or `"sqlite"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Database path for the `sqlite` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Load a TOML config file
///
/// Returns `ConfigFile::default()` if the file doesn't exist.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    tracing::info!(
        path = %path.display(),
        devices = config.devices.len(),
        "loaded config file"
    );
    Ok(config)
}

/// Return the default config file path: `~/.config/fakeroku/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("fakeroku").join("config.toml"))
}

/// Sink for configuration changes made at runtime
///
/// Only used to write back freshly generated device UUIDs, once per start.
pub trait ConfigPersister: Send + Sync {
    /// Persist the full updated configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration cannot be written
    fn save(&self, config: &ConfigFile) -> Result<()>;
}

/// Writes the configuration back to its TOML file
#[derive(Debug, Clone)]
pub struct TomlPersister {
    path: PathBuf,
}

impl TomlPersister {
    /// Create a persister targeting the given file
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Target file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPersister for TomlPersister {
    fn save(&self, config: &ConfigFile) -> Result<()> {
        let content = toml::to_string_pretty(config)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        // Sibling temp file, then rename over the target
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %self.path.display(), "updated config with new uuid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_string_ports() {
        let config: ConfigFile = toml::from_str(
            r#"
            bind = "192.168.1.20"

            [[devices]]
            name = "Living Room"
            port = 9093

            [[devices]]
            name = "Bedroom"
            port = "9094"
            uuid = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.as_deref(), Some("192.168.1.20"));
        assert_eq!(config.devices[0].port, Some(PortValue::Number(9093)));
        assert_eq!(config.devices[1].port, Some(PortValue::Text("9094".into())));
        assert_eq!(config.devices[1].uuid.as_deref(), Some("abc"));
    }

    #[test]
    fn odd_port_values_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [[devices]]
            name = "Den"
            port = 9093.5

            [[devices]]
            name = "Hall"
            port = true
            "#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].port, Some(PortValue::Float(9093.5)));
        assert_eq!(
            config.devices[1].port,
            Some(PortValue::Other(toml::Value::Boolean(true)))
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "devices = 7").unwrap();

        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn persister_round_trips_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let persister = TomlPersister::new(path.clone());

        let config = ConfigFile {
            devices: vec![DeviceEntry {
                name: Some("Den".into()),
                port: Some(PortValue::Number(9100)),
                uuid: Some("0123456789abcdef0123456789abcdef".into()),
            }],
            ..ConfigFile::default()
        };
        persister.save(&config).unwrap();

        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
