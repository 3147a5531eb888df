//! Configuration management for the emulator

pub mod file;

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub use file::{ConfigFile, ConfigPersister, DeviceEntry, PortValue, StoreFileConfig, TomlPersister};

use crate::Result;

/// Default SSDP multicast group
pub const DEFAULT_MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Default bind address for all listeners
pub const DEFAULT_BIND: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Port used when a device port is missing or not numeric
pub const DEFAULT_HTTP_PORT: u16 = 9093;

/// Well-known SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Emulator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Multicast group joined by the discovery responder
    pub multicast_ip: Ipv4Addr,

    /// Address every listener binds to and advertises in `LOCATION`
    pub bind: Ipv4Addr,

    /// UDP port for discovery (1900 outside of tests)
    pub discovery_port: u16,

    /// State store selection
    pub store: StoreConfig,

    /// Raw file contents, kept so generated UUIDs can be written back
    pub file: ConfigFile,

    /// Where the file was loaded from
    pub source: Option<PathBuf>,
}

/// State store backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Process-local map, lost on exit
    Memory,
    /// `SQLite` database at the given path
    Sqlite(PathBuf),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            multicast_ip: DEFAULT_MULTICAST_IP,
            bind: DEFAULT_BIND,
            discovery_port: SSDP_PORT,
            store: StoreConfig::Memory,
            file: ConfigFile::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, applying env overrides
    ///
    /// Priority is env > toml > default.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(file::config_file_path);
        let fc = match &path {
            Some(p) => file::load_config_file(p)?,
            None => ConfigFile::default(),
        };

        let multicast_env = std::env::var("FAKEROKU_MULTICAST_IP").ok();
        let bind_env = std::env::var("FAKEROKU_BIND").ok();

        Ok(Self::from_file(fc, path, multicast_env, bind_env))
    }

    /// Resolve a parsed config file into runtime configuration
    ///
    /// Invalid addresses fall back to their defaults with a warning.
    #[must_use]
    pub fn from_file(
        fc: ConfigFile,
        source: Option<PathBuf>,
        multicast_env: Option<String>,
        bind_env: Option<String>,
    ) -> Self {
        let multicast_ip = parse_addr(
            "multicast_ip",
            multicast_env.or_else(|| fc.multicast_ip.clone()),
            DEFAULT_MULTICAST_IP,
        );
        let bind = parse_addr("bind", bind_env.or_else(|| fc.bind.clone()), DEFAULT_BIND);
        let store = resolve_store(fc.store.as_ref());

        Self {
            multicast_ip,
            bind,
            discovery_port: SSDP_PORT,
            store,
            file: fc,
            source,
        }
    }

    /// Configured device entries
    #[must_use]
    pub fn devices(&self) -> &[DeviceEntry] {
        &self.file.devices
    }
}

fn parse_addr(field: &str, value: Option<String>, default: Ipv4Addr) -> Ipv4Addr {
    match value {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(field, value = %raw, error = %e, "invalid address, using default");
            default
        }),
        _ => default,
    }
}

fn resolve_store(section: Option<&StoreFileConfig>) -> StoreConfig {
    let backend = section.and_then(|s| s.backend.as_deref()).unwrap_or("memory");
    match backend {
        "memory" => StoreConfig::Memory,
        "sqlite" => {
            let path = section
                .and_then(|s| s.path.as_deref())
                .map_or_else(default_store_path, PathBuf::from);
            StoreConfig::Sqlite(path)
        }
        other => {
            tracing::warn!(backend = other, "unknown store backend, using memory");
            StoreConfig::Memory
        }
    }
}

/// Default `SQLite` path (`~/.local/share/fakeroku/states.db` on Linux)
fn default_store_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("states.db"),
        |d| d.data_dir().join("fakeroku").join("states.db"),
    )
}

/// Resolve a configured port
///
/// Missing, zero or non-numeric values become [`DEFAULT_HTTP_PORT`];
/// fractions are truncated and numbers outside `0..=65535` are clamped into
/// range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn resolve_port(value: Option<&PortValue>) -> u16 {
    let parsed = match value {
        Some(PortValue::Number(n)) => Some(*n),
        // Saturating cast; out-of-range values are clamped below
        Some(PortValue::Float(f)) => f.is_finite().then(|| f.trunc() as i64),
        Some(PortValue::Text(s)) => parse_leading_int(s),
        Some(PortValue::Other(_)) | None => None,
    };

    match parsed {
        None | Some(0) => DEFAULT_HTTP_PORT,
        Some(n) => u16::try_from(n.clamp(0, i64::from(u16::MAX))).unwrap_or(DEFAULT_HTTP_PORT),
    }
}

/// Parse an optional sign and leading digits, ignoring any trailing text
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    // Saturate absurdly long inputs; they get clamped anyway
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_when_missing_or_invalid() {
        assert_eq!(resolve_port(None), DEFAULT_HTTP_PORT);
        assert_eq!(resolve_port(Some(&PortValue::Text("abc".into()))), DEFAULT_HTTP_PORT);
        assert_eq!(resolve_port(Some(&PortValue::Text(String::new()))), DEFAULT_HTTP_PORT);
        assert_eq!(resolve_port(Some(&PortValue::Number(0))), DEFAULT_HTTP_PORT);
    }

    #[test]
    fn port_is_clamped_into_range() {
        assert_eq!(resolve_port(Some(&PortValue::Number(70_000))), 65535);
        assert_eq!(resolve_port(Some(&PortValue::Number(-4))), 0);
        assert_eq!(resolve_port(Some(&PortValue::Text("99999".into()))), 65535);
    }

    #[test]
    fn non_integer_ports_are_truncated_or_defaulted() {
        assert_eq!(resolve_port(Some(&PortValue::Float(9093.5))), 9093);
        assert_eq!(resolve_port(Some(&PortValue::Float(0.4))), DEFAULT_HTTP_PORT);
        assert_eq!(resolve_port(Some(&PortValue::Float(f64::NAN))), DEFAULT_HTTP_PORT);
        assert_eq!(
            resolve_port(Some(&PortValue::Other(toml::Value::Boolean(true)))),
            DEFAULT_HTTP_PORT
        );
    }

    #[test]
    fn port_text_uses_leading_digits() {
        assert_eq!(resolve_port(Some(&PortValue::Text("9100".into()))), 9100);
        assert_eq!(resolve_port(Some(&PortValue::Text(" 8060abc".into()))), 8060);
    }

    #[test]
    fn env_overrides_file_addresses() {
        let fc = ConfigFile {
            multicast_ip: Some("239.1.1.1".into()),
            bind: Some("10.0.0.2".into()),
            ..ConfigFile::default()
        };
        let config = Config::from_file(fc, None, None, Some("10.0.0.9".into()));

        assert_eq!(config.multicast_ip, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(config.bind, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn invalid_addresses_fall_back_to_defaults() {
        let fc = ConfigFile {
            multicast_ip: Some("not-an-ip".into()),
            bind: Some(String::new()),
            ..ConfigFile::default()
        };
        let config = Config::from_file(fc, None, None, None);

        assert_eq!(config.multicast_ip, DEFAULT_MULTICAST_IP);
        assert_eq!(config.bind, DEFAULT_BIND);
    }

    #[test]
    fn store_backend_selection() {
        assert_eq!(resolve_store(None), StoreConfig::Memory);
        assert_eq!(Config::default().store, resolve_store(None));

        let memory = StoreFileConfig {
            backend: Some("memory".into()),
            path: None,
        };
        assert_eq!(resolve_store(Some(&memory)), StoreConfig::Memory);

        let sqlite = StoreFileConfig {
            backend: Some("sqlite".into()),
            path: Some("/tmp/x.db".into()),
        };
        assert_eq!(
            resolve_store(Some(&sqlite)),
            StoreConfig::Sqlite(PathBuf::from("/tmp/x.db"))
        );
    }
}
