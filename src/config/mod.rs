//! Configuration for the removal core.
//!
//! Defaults are usable as-is; overrides layer in from an optional
//! TOML file and `NODE_REAPER__`-prefixed environment variables
//! (highest priority).

mod storage;
mod tailer;

pub use storage::*;
pub use tailer::*;

#[cfg(test)]
mod config_test;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Commit-log tailer retry behavior
    #[serde(default)]
    pub tailer: TailerConfig,

    /// Embedded database tuning
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Settings {
    /// Load configuration with priority:
    /// 1. Hardcoded defaults
    /// 2. Optional config file
    /// 3. Environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("NODE_REAPER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validates all subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.tailer.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}
