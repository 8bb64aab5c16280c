//! Storage abstraction for the removal core.
//!
//! Two narrow traits decouple the core from any particular store:
//! [`DocumentStore`] for per-document atomic CRUD, and [`CommitLog`]
//! for ordered change capture. Any engine offering both — a
//! replicated log, a CDC stream, or the in-memory double — can back
//! the whole subsystem.

mod adaptors;
mod commit_log;
mod store;

pub use adaptors::*;
pub use commit_log::*;
pub use store::*;
