//! Node-lifecycle tracking and change-notification core for cluster
//! orchestrators.
//!
//! The crate records which cluster nodes ("machines") are marked
//! dead and pending reclamation, and propagates every committed
//! mutation of that set to in-process observers — commit-ordered,
//! at-least-once, coalesced, and without polling.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use node_reaper::{Connection, MemoryStore, Settings};
//!
//! # async fn demo() -> node_reaper::Result<()> {
//! let conn = Connection::open(Arc::new(MemoryStore::new()), &Settings::default());
//!
//! let mut watcher = conn.watch_removals()?;
//! watcher.changes().recv().await; // initial pulse: read state now
//!
//! conn.create_removal("42")?;
//! watcher.changes().recv().await; // something changed
//! for record in conn.list_removals()? {
//!     println!("pending removal: {}", record.machine_id());
//! }
//!
//! conn.clear_removals(["42"])?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Watchers signal *that* something changed, never *what*: consumers
//! re-read the registry after each pulse. [`NotifyWatcher`] documents
//! the delivery pipeline and its coalescing rules.

#[cfg(test)]
pub(crate) mod test_utils;

mod config;
mod connection;
mod constants;
mod errors;
mod registry;
mod storage;
mod tailer;
mod utils;
mod watch;

pub use config::*;
pub use connection::*;
pub use constants::REMOVALS_COLLECTION;
pub use errors::*;
pub use registry::*;
pub use storage::*;
pub use tailer::*;
pub use watch::*;
