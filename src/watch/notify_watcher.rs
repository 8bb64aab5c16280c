use std::collections::HashSet;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;

use super::Multiplexer;
use crate::ChangeBatch;
use crate::WatchError;

/// Watcher lifecycle. `Stopped` and `Closed` are terminal for pulse
/// delivery; `Closed` additionally guarantees every owned resource
/// has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    Initializing = 0,
    Running = 1,
    Stopped = 2,
    Closed = 3,
}

impl WatchState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Initializing,
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Closed,
        }
    }
}

/// State shared between a watcher handle and its registration in the
/// multiplexer. The handle owns the pulse receiver; everything else
/// lives here.
pub(crate) struct WatcherCore {
    id: u64,
    collection: String,
    filter: Option<HashSet<String>>,
    state: AtomicU8,
    /// Terminal fault; set at most once, before the state leaves
    /// Running, and immutable afterwards.
    error: OnceLock<WatchError>,
    /// Send side of the pulse slot. Dropping it closes the channel,
    /// which is how consumers observe the stop.
    pulse_tx: Mutex<Option<mpsc::Sender<()>>>,
    closed_tx: watch::Sender<bool>,
}

impl WatcherCore {
    pub(crate) fn new(
        id: u64,
        collection: String,
        filter: Option<HashSet<String>>,
        pulse_tx: mpsc::Sender<()>,
    ) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            id,
            collection,
            filter,
            state: AtomicU8::new(WatchState::Initializing as u8),
            error: OnceLock::new(),
            pulse_tx: Mutex::new(Some(pulse_tx)),
            closed_tx,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> WatchState {
        WatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_live(&self) -> bool {
        matches!(self.state(), WatchState::Initializing | WatchState::Running)
    }

    /// Delivers the synthetic initial pulse and enters Running.
    pub(crate) fn start(&self) {
        self.send_pulse();
        let _ = self.state.compare_exchange(
            WatchState::Initializing as u8,
            WatchState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Coalescing pulse delivery; returns whether the watcher was
    /// still Running. A full slot counts as delivered: the pending
    /// pulse already covers this batch.
    pub(crate) fn pulse(&self) -> bool {
        if self.state.load(Ordering::Acquire) != WatchState::Running as u8 {
            return false;
        }
        self.send_pulse()
    }

    fn send_pulse(&self) -> bool {
        match self.pulse_tx.lock().as_ref() {
            Some(tx) => {
                let _ = tx.try_send(());
                true
            }
            None => false,
        }
    }

    pub(crate) fn matches(
        &self,
        batch: &ChangeBatch,
    ) -> bool {
        if batch.collection != self.collection {
            return false;
        }
        match &self.filter {
            None => true,
            Some(keys) => batch.keys.iter().any(|k| keys.contains(k)),
        }
    }

    /// One-winner transition out of the live states. The winner
    /// releases every owned resource before reporting Closed, so
    /// Closed always follows Stopped promptly.
    pub(crate) fn terminate(
        &self,
        err: Option<WatchError>,
    ) -> bool {
        if let Some(e) = err {
            let _ = self.error.set(e);
        }

        let won = self
            .state
            .compare_exchange(
                WatchState::Running as u8,
                WatchState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
            || self
                .state
                .compare_exchange(
                    WatchState::Initializing as u8,
                    WatchState::Stopped as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok();

        if won {
            *self.pulse_tx.lock() = None;
            self.state
                .store(WatchState::Closed as u8, Ordering::Release);
            self.closed_tx.send_replace(true);
            trace!(watcher_id = self.id, "watcher closed");
        }
        won
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    pub(crate) fn terminal_result(&self) -> std::result::Result<(), WatchError> {
        match self.error.get() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Handle to one standing change subscription.
///
/// Exactly one pulse is pending immediately after creation, modeling
/// "current state is unknown to the caller, read it now". Afterwards
/// pulses arrive coalesced: however many relevant commits land while
/// the consumer is away, one pulse is waiting when it returns.
pub struct NotifyWatcher {
    core: Arc<WatcherCore>,
    mux: Multiplexer,
    changes: Option<mpsc::Receiver<()>>,
}

impl NotifyWatcher {
    pub(crate) fn new(
        core: Arc<WatcherCore>,
        mux: Multiplexer,
        changes: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            core,
            mux,
            changes: Some(changes),
        }
    }

    pub fn id(&self) -> u64 {
        self.core.id()
    }

    pub fn state(&self) -> WatchState {
        self.core.state()
    }

    /// The pulse channel. Yields `()` per coalesced notification and
    /// `None` once the watcher is stopped.
    ///
    /// # Panics
    ///
    /// Panics if the receiver was moved out via [`changes_stream`].
    ///
    /// [`changes_stream`]: NotifyWatcher::changes_stream
    pub fn changes(&mut self) -> &mut mpsc::Receiver<()> {
        self.changes
            .as_mut()
            .expect("changes receiver already taken")
    }

    /// Moves the pulse channel out as a `Stream`, for consumers
    /// composing with stream combinators. The handle keeps working
    /// for `stop()`/`err()`/`wait()`.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn changes_stream(&mut self) -> ReceiverStream<()> {
        ReceiverStream::new(
            self.changes
                .take()
                .expect("changes receiver already taken"),
        )
    }

    /// Stops the watcher. Idempotent and safe to race from multiple
    /// tasks: exactly one caller performs the transition, the rest
    /// are no-ops. Never blocks on consumer behavior or in-flight
    /// dispatch.
    ///
    /// Returns the terminal fault if the watcher had already been
    /// killed by one, `Ok` for explicit stops.
    pub fn stop(&self) -> std::result::Result<(), WatchError> {
        if self.core.terminate(None) {
            self.mux.deregister(self.core.id());
            trace!(watcher_id = self.core.id(), "watcher stopped by caller");
        }
        self.core.terminal_result()
    }

    /// The fault that stopped the watcher, or `None` after an
    /// explicit stop. Only meaningful once the watcher has left
    /// Running; returns `None` before that.
    pub fn err(&self) -> Option<WatchError> {
        match self.core.state() {
            WatchState::Stopped | WatchState::Closed => self.core.error.get().cloned(),
            _ => None,
        }
    }

    /// Blocks until the watcher is Closed, then reports the same
    /// outcome as [`err`]. Unblocks promptly after `stop()` or a
    /// tailer fault; no polling.
    ///
    /// [`err`]: NotifyWatcher::err
    pub async fn wait(&self) -> std::result::Result<(), WatchError> {
        let mut closed = self.core.subscribe_closed();
        while !*closed.borrow_and_update() {
            if closed.changed().await.is_err() {
                break;
            }
        }
        self.core.terminal_result()
    }
}

impl Drop for NotifyWatcher {
    fn drop(&mut self) {
        if self.core.terminate(None) {
            self.mux.deregister(self.core.id());
            trace!(watcher_id = self.core.id(), "watcher stopped on drop");
        }
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("id", &self.core.id())
            .field("state", &self.core.state())
            .finish_non_exhaustive()
    }
}
