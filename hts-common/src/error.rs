//! Common error types for the tariff classification service

use thiserror::Error;

/// Common result type for catalog and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the classifier crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or payload JSON could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration file could not be decoded
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog row whose code is not a digit string.
    ///
    /// Fatal: a partially built catalog is never served.
    #[error("Malformed catalog row at position {position}: code {code:?}")]
    MalformedCatalogRow { position: usize, code: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
