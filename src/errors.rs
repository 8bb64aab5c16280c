//! Error hierarchy for the node-removal core.
//!
//! Errors are categorized by layer: durable-store faults, watcher
//! protocol faults, and configuration validation failures. Store
//! errors propagate untranslated, wrapped with the failing operation
//! and the affected id.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Durable-store failures (I/O, serialization, corruption)
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Watcher protocol faults (tailer death, closed connection)
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed caller input, rejected before touching the store
    #[error("invalid machine id: {0:?}")]
    InvalidMachineId(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during store operations
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failures for persisted data
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    /// Embedded database errors
    #[error("embedded database error: {0}")]
    Db(String),

    /// Checksum or format validation failures
    #[error("data corruption detected at {location}")]
    Corruption { location: String },

    /// A store fault annotated with the operation and the affected id
    #[error("{op} failed for {key:?}")]
    Operation {
        op: &'static str,
        key: String,
        #[source]
        source: Box<StorageError>,
    },
}

/// Terminal error carried by a stopped watcher.
///
/// Cloneable by design: the same fault is reported through `err()`,
/// `stop()` and `wait()` on every handle it killed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The shared commit-log tailer died; every watcher on the
    /// connection is stopped with this error.
    #[error("commit log tailer failed: {0}")]
    TailerFailed(String),

    /// The owning connection has begun teardown; no new watchers can
    /// be registered.
    #[error("store connection is closed")]
    ConnectionClosed,
}

// ============== Conversion Implementations ============== //
impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Db(err.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        StorageError::Db(err.to_string()).into()
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        StorageError::Bincode(err).into()
    }
}
