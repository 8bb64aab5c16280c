use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::trace;

use crate::ChangeBatch;
use crate::CommitLog;
use crate::DocumentStore;
use crate::Result;

/// In-memory store with an in-process commit log.
///
/// The test double for the whole subsystem, also usable embedded.
/// Every mutation appends its batch under the same write lock that
/// changes the documents, so commit order equals mutation order.
#[derive(Debug)]
pub struct MemoryStore {
    /// collection -> key -> encoded document
    docs: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    commits: RwLock<BTreeMap<u64, ChangeBatch>>,
    last_seq: AtomicU64,
    commit_tx: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (commit_tx, _) = watch::channel(0);
        Self {
            docs: RwLock::new(HashMap::new()),
            commits: RwLock::new(BTreeMap::new()),
            last_seq: AtomicU64::new(0),
            commit_tx,
        }
    }

    /// Appends one batch for `keys` and signals the new sequence.
    /// Caller must still hold the docs write lock to keep commit
    /// order aligned with mutation order.
    fn commit(
        &self,
        collection: &str,
        keys: Vec<String>,
    ) {
        let mut commits = self.commits.write();
        let seq = self.last_seq.fetch_add(1, Ordering::SeqCst) + 1;
        commits.insert(
            seq,
            ChangeBatch {
                seq,
                collection: collection.to_string(),
                keys,
            },
        );
        self.commit_tx.send_replace(seq);
        trace!(seq, collection, "commit recorded");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn insert(
        &self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<bool> {
        let mut docs = self.docs.write();
        let coll = docs.entry(collection.to_string()).or_default();
        if coll.contains_key(key) {
            return Ok(false);
        }
        coll.insert(key.to_string(), value);
        self.commit(collection, vec![key.to_string()]);
        Ok(true)
    }

    fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let docs = self.docs.read();
        Ok(docs
            .get(collection)
            .map(|coll| coll.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn remove_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<Vec<String>> {
        let mut docs = self.docs.write();
        let mut removed = Vec::new();
        if let Some(coll) = docs.get_mut(collection) {
            for key in keys {
                if coll.remove(key).is_some() {
                    removed.push(key.clone());
                }
            }
        }
        if !removed.is_empty() {
            self.commit(collection, removed.clone());
        }
        Ok(removed)
    }
}

impl CommitLog for MemoryStore {
    fn batches_after(
        &self,
        seq: u64,
    ) -> Result<Vec<ChangeBatch>> {
        let commits = self.commits.read();
        Ok(commits
            .range((Bound::Excluded(seq), Bound::Unbounded))
            .map(|(_, batch)| batch.clone())
            .collect())
    }

    fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::SeqCst)
    }

    fn commit_signal(&self) -> watch::Receiver<u64> {
        self.commit_tx.subscribe()
    }
}

// Test helper methods
#[cfg(test)]
impl MemoryStore {
    pub fn commit_count(&self) -> usize {
        self.commits.read().len()
    }

    pub fn doc_count(
        &self,
        collection: &str,
    ) -> usize {
        self.docs.read().get(collection).map(|c| c.len()).unwrap_or(0)
    }
}
