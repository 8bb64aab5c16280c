use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Embedded database tuning for the sled-backed store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Page cache size in bytes
    #[serde(default = "default_cache_capacity_bytes")]
    pub cache_capacity_bytes: u64,

    /// Background flush interval; `None` flushes only on drop
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: default_cache_capacity_bytes(),
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cache_capacity_bytes must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_cache_capacity_bytes() -> u64 {
    8 * 1024 * 1024 // 8MB
}
fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}
