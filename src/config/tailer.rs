use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Retry behavior for the commit-log tailer's read path.
///
/// A transient read fault is retried with jittered exponential
/// backoff; once `max_read_retries` attempts have failed the tailer
/// reports a terminal error to every watcher and stops.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TailerConfig {
    /// Attempts per read before the fault is treated as fatal
    #[serde(default = "default_max_read_retries")]
    pub max_read_retries: usize,

    /// Backoff before the first retry (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            max_read_retries: default_max_read_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl TailerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_read_retries == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_read_retries must be greater than 0".into(),
            )));
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(ConfigError::Message(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            )));
        }

        Ok(())
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_max_read_retries() -> usize {
    5
}
// in ms
fn default_initial_backoff_ms() -> u64 {
    50
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
