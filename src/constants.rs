/// Collection holding one document per node pending removal.
pub const REMOVALS_COLLECTION: &str = "machine-removals";

/// Capacity of a watcher's pulse slot. Fixed at one: a pending,
/// undrained pulse absorbs every further matching batch.
pub(crate) const PULSE_SLOT_CAPACITY: usize = 1;

// Sled tree names, one tree per concern.
pub(crate) const SLED_DOCS_TREE: &str = "reaper_docs";
pub(crate) const SLED_COMMITS_TREE: &str = "reaper_commits";

/// Sequence-counter key inside the commits tree. A single zero byte
/// sorts before every 8-byte big-endian sequence key, so range scans
/// over real batches never see it.
pub(crate) const COMMIT_SEQ_KEY: &[u8] = &[0x00];

/// Separator between collection and document key in sled doc keys.
/// Collection names never contain it; document keys may.
pub(crate) const DOC_KEY_SEPARATOR: u8 = b'/';
