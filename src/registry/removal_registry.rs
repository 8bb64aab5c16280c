use std::sync::Arc;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::constants::REMOVALS_COLLECTION;
use crate::DocumentStore;
use crate::Error;
use crate::Result;
use crate::StorageError;

/// Marker that a node's termination has been confirmed and the node
/// awaits reclamation. Never mutated in place: created once, deleted
/// once the node has been physically reclaimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalRecord {
    machine_id: String,
    marked_at: SystemTime,
}

impl RemovalRecord {
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn marked_at(&self) -> SystemTime {
        self.marked_at
    }
}

/// CRUD surface over the pending-removal collection.
///
/// All operations are idempotent: marking an already-marked node and
/// clearing ids with no record are success paths. Only store-level
/// faults surface as errors, wrapped with the operation and id.
pub struct RemovalRegistry<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> RemovalRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Records `machine_id` as pending removal. A no-op if a record
    /// already exists.
    pub fn create_removal(
        &self,
        machine_id: &str,
    ) -> Result<()> {
        if machine_id.is_empty() {
            return Err(Error::InvalidMachineId(machine_id.to_string()));
        }

        let record = RemovalRecord {
            machine_id: machine_id.to_string(),
            marked_at: SystemTime::now(),
        };
        let value = bincode::serialize(&record).map_err(StorageError::Bincode)?;

        let created = self
            .store
            .insert(REMOVALS_COLLECTION, machine_id, value)
            .map_err(|e| with_context("create-removal", machine_id, e))?;

        if created {
            debug!(machine_id, "machine marked for removal");
        } else {
            trace!(machine_id, "machine already marked for removal");
        }
        Ok(())
    }

    /// Snapshot of every pending removal. Order is not meaningful.
    pub fn list_removals(&self) -> Result<Vec<RemovalRecord>> {
        let docs = self
            .store
            .list(REMOVALS_COLLECTION)
            .map_err(|e| with_context("list-removals", REMOVALS_COLLECTION, e))?;

        docs.into_iter()
            .map(|(key, value)| {
                bincode::deserialize::<RemovalRecord>(&value).map_err(|e| {
                    Error::Storage(StorageError::Operation {
                        op: "list-removals",
                        key,
                        source: Box::new(StorageError::Bincode(e)),
                    })
                })
            })
            .collect()
    }

    /// Deletes the records for every id present in `ids`; absent ids
    /// are silently ignored.
    pub fn clear_removals<I, T>(
        &self,
        ids: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let removed = self
            .store
            .remove_many(REMOVALS_COLLECTION, &ids)
            .map_err(|e| with_context("clear-removals", &ids.join(","), e))?;

        debug!(requested = ids.len(), cleared = removed.len(), "removals cleared");
        Ok(())
    }
}

/// Annotates a store fault with the failing operation and the
/// affected id; non-store errors pass through untouched.
fn with_context(
    op: &'static str,
    key: &str,
    err: Error,
) -> Error {
    match err {
        Error::Storage(source) => Error::Storage(StorageError::Operation {
            op,
            key: key.to_string(),
            source: Box::new(source),
        }),
        other => other,
    }
}
