//! Error types for the fakeroku emulator

use thiserror::Error;

/// Result type alias for fakeroku operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the emulator
///
/// None of these are fatal to a running process: store errors abort one
/// state transition, transport errors tear down one listener, protocol
/// errors are dropped after a debug log.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing device configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// State store lookup, create or write failure
    #[error("store error: {0}")]
    Store(String),

    /// Socket or listener bind/runtime failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed datagram or unrecognized command
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding error
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
