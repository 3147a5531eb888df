//! fakeroku - Roku ECP device emulator
//!
//! Presents one or more virtual Roku players on the local network. Remote
//! control apps discover them over SSDP and send External Control Protocol
//! commands, which are recorded as boolean states in a state store:
//! - SSDP discovery responder
//! - Per-device ECP HTTP listeners
//! - Command interpretation (key presses, app launches)
//! - Pluggable state store (in-memory or `SQLite`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Remote control apps                  │
//! │        M-SEARCH (UDP 1900)  │  ECP (HTTP)           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     fakeroku                         │
//! │   Discovery  │  ECP listeners  │  Dispatcher        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   State store                        │
//! │   <device>.keys.<key>  │  <device>.apps.<app id>    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod shutdown;
pub mod store;

pub use api::{EcpServer, EcpState, ListenerState};
pub use command::{Command, Dispatcher};
pub use config::{Config, ConfigPersister, StoreConfig, TomlPersister};
pub use daemon::Daemon;
pub use discovery::{DiscoveryConfig, DiscoveryResponder, ResponderState};
pub use error::{Error, Result};
pub use registry::{Device, DeviceRegistry};
pub use store::{MemoryStore, SharedStore, SqliteStore, StateId, StateStore};
