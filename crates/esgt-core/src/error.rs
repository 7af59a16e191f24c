//! Error types and result aliases for the ESGT core crate.

use thiserror::Error;

/// Errors produced by core types, configuration loading, and fabric access.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration failed semantic validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration source could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// TOML parse failure when loading an explicit config file.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem access failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fabric node id was not registered.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Content could not be delivered to recruited nodes.
    #[error("broadcast delivery failed: {0}")]
    BroadcastFailed(String),
}

/// Result alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;
