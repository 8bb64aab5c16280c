//! The commit-log tailer: sole reader of a store's ordered change
//! stream, one per connection, shared by every watcher on it.

mod commit_tailer;

#[cfg(test)]
mod commit_tailer_test;

pub use commit_tailer::CommitTailer;
