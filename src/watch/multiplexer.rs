use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;
use tracing::warn;

use super::notify_watcher::WatcherCore;
use super::NotifyWatcher;
use crate::constants::PULSE_SLOT_CAPACITY;
use crate::ChangeBatch;
use crate::WatchError;

struct Registration {
    core: Arc<WatcherCore>,
}

struct MuxInner {
    /// Live registrations by watcher id.
    registrations: DashMap<u64, Registration>,

    /// Next watcher id (monotonically increasing).
    next_id: AtomicU64,

    /// Terminal tailer fault. Once set, every live watcher is
    /// stopped with it and later registrations are stillborn.
    failure: OnceLock<WatchError>,
}

/// Fan-out router from change batches to matching watcher pulses.
///
/// Registration and deregistration are safe concurrently with
/// ongoing dispatch: a registration removed mid-dispatch simply
/// stops receiving further pulses.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<MuxInner>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MuxInner {
                registrations: DashMap::new(),
                next_id: AtomicU64::new(1),
                failure: OnceLock::new(),
            }),
        }
    }

    /// Registers a watcher for `collection`, optionally narrowed to
    /// a key set (`None` matches any key). The returned handle has
    /// its initial pulse already pending.
    ///
    /// If the shared tailer has already died, the handle comes back
    /// pre-stopped carrying the tailer's fault.
    pub fn register(
        &self,
        collection: &str,
        filter: Option<Vec<String>>,
    ) -> NotifyWatcher {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (pulse_tx, pulse_rx) = mpsc::channel(PULSE_SLOT_CAPACITY);

        let core = Arc::new(WatcherCore::new(
            id,
            collection.to_string(),
            filter.map(|keys| keys.into_iter().collect::<HashSet<_>>()),
            pulse_tx,
        ));
        core.start();

        self.inner
            .registrations
            .insert(id, Registration { core: core.clone() });

        // Ordered against fail_all: the failure is published before
        // the table is cleared, so a racing registration either gets
        // swept there or observes the failure here.
        if let Some(err) = self.inner.failure.get() {
            if core.terminate(Some(err.clone())) {
                self.inner.registrations.remove(&id);
            }
        } else {
            trace!(watcher_id = id, collection, "watcher registered");
        }

        NotifyWatcher::new(core, self.clone(), pulse_rx)
    }

    /// Routes one batch to every matching live watcher, sweeping
    /// registrations that are no longer live. Called by the tailer
    /// in commit order.
    pub fn dispatch(
        &self,
        batch: &ChangeBatch,
    ) {
        let mut matched = 0usize;
        self.inner.registrations.retain(|_, reg| {
            if reg.core.matches(batch) && reg.core.pulse() {
                matched += 1;
            }
            reg.core.is_live()
        });

        trace!(
            seq = batch.seq,
            collection = %batch.collection,
            matched,
            "change batch dispatched"
        );
    }

    /// Stops every live watcher with the tailer's terminal fault and
    /// drops all registrations. No further dispatch reaches them.
    pub(crate) fn fail_all(
        &self,
        err: WatchError,
    ) {
        let _ = self.inner.failure.set(err.clone());

        let mut stopped = 0usize;
        self.inner.registrations.retain(|_, reg| {
            if reg.core.terminate(Some(err.clone())) {
                stopped += 1;
            }
            false
        });

        warn!(stopped, error = %err, "all watchers stopped by tailer fault");
    }

    /// Stops every live watcher without an error (connection
    /// teardown path).
    pub(crate) fn stop_all(&self) {
        let mut stopped = 0usize;
        self.inner.registrations.retain(|_, reg| {
            if reg.core.terminate(None) {
                stopped += 1;
            }
            false
        });

        trace!(stopped, "all watchers stopped");
    }

    pub(crate) fn deregister(
        &self,
        id: u64,
    ) {
        self.inner.registrations.remove(&id);
    }

    /// Number of live registrations. Primarily for tests and
    /// monitoring.
    pub fn watcher_count(&self) -> usize {
        self.inner.registrations.len()
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("watchers", &self.inner.registrations.len())
            .finish_non_exhaustive()
    }
}
