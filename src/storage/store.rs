use crate::Result;

#[cfg(test)]
use mockall::automock;

/// Per-document atomic operations on a collection-scoped store.
///
/// Every state-changing call appends exactly one entry to the store's
/// commit log, atomically with the document write. Calls that change
/// nothing (`insert` of a present key, `remove_many` of absent keys)
/// append nothing and raise no change signal.
#[cfg_attr(test, automock)]
pub trait DocumentStore: Send + Sync + 'static {
    /// Inserts a document if the key is absent. Returns whether a
    /// document was created; `false` means one already existed and
    /// nothing changed.
    fn insert(
        &self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<bool>;

    /// Snapshot of every `(key, value)` pair in the collection.
    /// Order is not meaningful.
    fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Vec<u8>)>>;

    /// Deletes every present key in `keys`; absent keys are ignored.
    /// The whole set of deletions commits as one coalesced commit-log
    /// entry. Returns the keys actually removed.
    fn remove_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<Vec<String>>;
}
