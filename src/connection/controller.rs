use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::constants::REMOVALS_COLLECTION;
use crate::CommitLog;
use crate::CommitTailer;
use crate::DocumentStore;
use crate::Multiplexer;
use crate::NotifyWatcher;
use crate::RemovalRecord;
use crate::RemovalRegistry;
use crate::Result;
use crate::Settings;
use crate::WatchError;

/// Owns the tailer and multiplexer for the lifetime of one store
/// connection and fronts the removal operations.
///
/// Everything is scoped to the instance — no process-wide state —
/// so independent connections (tests, tenants) never share a tailer.
/// [`close`](Connection::close) tears the whole stack down
/// deterministically: tailer first, then every live watcher.
pub struct Connection<S>
where
    S: DocumentStore + CommitLog,
{
    registry: RemovalRegistry<S>,
    mux: Multiplexer,
    shutdown_tx: watch::Sender<()>,
    tailer_handle: Mutex<Option<JoinHandle<()>>>,
    closing: AtomicBool,
}

impl<S> Connection<S>
where
    S: DocumentStore + CommitLog,
{
    /// Opens a connection over `store` and spawns its tailer task.
    /// Must be called within a tokio runtime.
    pub fn open(
        store: Arc<S>,
        settings: &Settings,
    ) -> Self {
        let mux = Multiplexer::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let tailer = CommitTailer::new(
            store.clone(),
            mux.clone(),
            shutdown_rx,
            settings.tailer.clone(),
        );
        let handle = tokio::spawn(tailer.run());

        debug!("store connection opened");

        Self {
            registry: RemovalRegistry::new(store),
            mux,
            shutdown_tx,
            tailer_handle: Mutex::new(Some(handle)),
            closing: AtomicBool::new(false),
        }
    }

    /// Marks `machine_id` as pending removal (idempotent).
    pub fn create_removal(
        &self,
        machine_id: &str,
    ) -> Result<()> {
        self.registry.create_removal(machine_id)
    }

    /// Snapshot of every pending removal.
    pub fn list_removals(&self) -> Result<Vec<RemovalRecord>> {
        self.registry.list_removals()
    }

    /// Clears the records for the given ids (idempotent).
    pub fn clear_removals<I, T>(
        &self,
        ids: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.registry.clear_removals(ids)
    }

    /// Starts a watcher over the pending-removal set. Fails fast
    /// once teardown has begun.
    pub fn watch_removals(&self) -> Result<NotifyWatcher> {
        if self.closing.load(Ordering::Acquire) {
            return Err(WatchError::ConnectionClosed.into());
        }
        Ok(self.mux.register(REMOVALS_COLLECTION, None))
    }

    /// Tears the connection down: stops the tailer (no further
    /// batches), then stops every live watcher. Idempotent; safe to
    /// call from multiple tasks.
    pub async fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            debug!("store connection teardown started");
        }

        let _ = self.shutdown_tx.send(());

        let handle = self.tailer_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(?e, "tailer task terminated abnormally");
            }
        }

        self.mux.stop_all();
    }

    /// Number of live watchers on this connection.
    pub fn watcher_count(&self) -> usize {
        self.mux.watcher_count()
    }
}

impl<S> std::fmt::Debug for Connection<S>
where
    S: DocumentStore + CommitLog,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closing", &self.closing.load(Ordering::Acquire))
            .field("watchers", &self.mux.watcher_count())
            .finish_non_exhaustive()
    }
}
