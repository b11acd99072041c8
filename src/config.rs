//! Configuration for the chunk cache
//!
//! Provides the cache configuration with TOML file support, environment
//! variable overrides, and sensible defaults. The byte ceiling is an
//! explicit constructor argument to [`ChunkCache`](crate::ChunkCache);
//! there is no hidden global state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default cache ceiling: 4 GiB
pub const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Chunk cache configuration
///
/// # Example
///
/// ```rust
/// use chunk_cache::config::CacheConfig;
///
/// let config = CacheConfig::default().with_max_size(512 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum aggregate size of resident chunks in bytes
    ///
    /// The accountant may briefly overshoot this between an insert and the
    /// eviction worker catching up; steady-state usage stays at or below it.
    #[serde(default = "default_max_size")]
    pub max_size: u64,
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
        }
    }
}

impl CacheConfig {
    /// Set the byte ceiling
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// `CHUNK_CACHE_MAX_SIZE` overrides `max_size` when it parses as u64.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(max_size) = std::env::var("CHUNK_CACHE_MAX_SIZE") {
            if let Ok(bytes) = max_size.parse() {
                self.max_size = bytes;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid(
                "max_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
