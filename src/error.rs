//! Error types for the chunk cache
//!
//! Cache operations themselves are total: `add` always succeeds, `search`
//! encodes absence as an empty result, and eviction treats already-gone
//! chunks as no-ops. The only fallible surface is configuration handling.

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error while reading a config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config contents fail validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
