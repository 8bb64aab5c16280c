//! Change notification: watcher handles and the fan-out multiplexer.
//!
//! One commit-log tailer per store connection feeds the
//! [`Multiplexer`], which matches every [`ChangeBatch`](crate::ChangeBatch)
//! against the registered watchers and raises a coalesced pulse on
//! each match:
//!
//! ```text
//! store commit
//!      │
//!      ▼
//! ┌──────────────┐   dispatch    ┌────────────────────┐
//! │ CommitTailer │ ────────────► │    Multiplexer     │
//! └──────────────┘  (in order)   │ collection/key     │
//!                                │ filter matching    │
//!                                └────────┬───────────┘
//!                                         │ try_send (capacity 1)
//!                                         ▼
//!                                ┌────────────────────┐
//!                                │ NotifyWatcher      │
//!                                │ changes() channel  │
//!                                └────────────────────┘
//! ```
//!
//! Pulses carry no payload. A watcher's slot holds at most one
//! pending pulse; matching batches arriving before the consumer
//! drains it are absorbed. Consumers therefore learn "at least one
//! relevant commit happened since my last drain" and re-read the
//! registry for current state — producers never block on consumers.
//!
//! Every watcher runs the same lifecycle,
//! `Initializing → Running → Stopped → Closed`, driven by atomic
//! compare-and-swap so that concurrent `stop()` calls, tailer faults
//! and in-flight dispatch compose without double-close races.

mod multiplexer;
mod notify_watcher;


pub use multiplexer::Multiplexer;
pub use notify_watcher::NotifyWatcher;
pub use notify_watcher::WatchState;
