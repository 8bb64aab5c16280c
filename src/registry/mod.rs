//! The persistent set of pending-removal records.

mod removal_registry;


pub use removal_registry::RemovalRecord;
pub use removal_registry::RemovalRegistry;
