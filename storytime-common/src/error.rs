//! Common error types for Storytime

use thiserror::Error;

/// Common result type for Storytime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the Storytime crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration file
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
