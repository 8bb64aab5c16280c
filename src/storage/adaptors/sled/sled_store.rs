use std::path::Path;

use sled::transaction::ConflictableTransactionError;
use sled::transaction::ConflictableTransactionResult;
use sled::transaction::TransactionError;
use sled::transaction::TransactionalTree;
use sled::Transactional;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::constants::COMMIT_SEQ_KEY;
use crate::constants::DOC_KEY_SEPARATOR;
use crate::constants::SLED_COMMITS_TREE;
use crate::constants::SLED_DOCS_TREE;
use crate::ChangeBatch;
use crate::CommitLog;
use crate::DocumentStore;
use crate::Error;
use crate::Result;
use crate::StorageConfig;
use crate::StorageError;

/// Sled-backed store: documents and commit log in one embedded db.
///
/// Each mutation and its commit-log entry are applied in a single
/// cross-tree transaction, so a document change and its batch either
/// both persist or neither does. The sequence counter lives inside
/// the commits tree, which also serializes concurrent writers.
pub struct SledStore {
    #[allow(dead_code)]
    db: sled::Db,

    docs: sled::Tree,

    commits: sled::Tree,

    commit_tx: watch::Sender<u64>,
}

impl SledStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let db = sled::Config::default()
            .path(path.as_ref())
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .use_compression(true)
            .compression_factor(1)
            .open()
            .map_err(|e| {
                warn!("failed to open db at {:?}: {:?}", path.as_ref(), e);
                Error::from(e)
            })?;

        let docs = db.open_tree(SLED_DOCS_TREE)?;
        let commits = db.open_tree(SLED_COMMITS_TREE)?;

        let last = match commits.get(COMMIT_SEQ_KEY)? {
            Some(ivec) => decode_seq(&ivec)?,
            None => 0,
        };
        let (commit_tx, _) = watch::channel(last);

        Ok(Self {
            db,
            docs,
            commits,
            commit_tx,
        })
    }

    fn doc_key(
        collection: &str,
        key: &str,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(collection.len() + 1 + key.len());
        out.extend_from_slice(collection.as_bytes());
        out.push(DOC_KEY_SEPARATOR);
        out.extend_from_slice(key.as_bytes());
        out
    }

    fn seq_to_key(seq: u64) -> [u8; 8] {
        seq.to_be_bytes()
    }

    /// Reads, increments and writes back the sequence counter inside
    /// the surrounding transaction.
    fn bump_seq(
        commits: &TransactionalTree
    ) -> ConflictableTransactionResult<u64, StorageError> {
        let next = match commits.get(COMMIT_SEQ_KEY)? {
            Some(ivec) => {
                decode_seq(&ivec).map_err(ConflictableTransactionError::Abort)? + 1
            }
            None => 1,
        };
        commits.insert(COMMIT_SEQ_KEY, &next.to_be_bytes()[..])?;
        Ok(next)
    }

    /// Appends the batch for `keys` inside the transaction and
    /// returns its sequence.
    fn append_batch(
        commits: &TransactionalTree,
        collection: &str,
        keys: Vec<String>,
    ) -> ConflictableTransactionResult<u64, StorageError> {
        let seq = Self::bump_seq(commits)?;
        let batch = ChangeBatch {
            seq,
            collection: collection.to_string(),
            keys,
        };
        let encoded = bincode::serialize(&batch)
            .map_err(|e| ConflictableTransactionError::Abort(StorageError::Bincode(e)))?;
        let key = Self::seq_to_key(seq);
        commits.insert(&key[..], encoded)?;
        Ok(seq)
    }

    fn tx_error(err: TransactionError<StorageError>) -> Error {
        match err {
            TransactionError::Abort(e) => e.into(),
            TransactionError::Storage(e) => StorageError::from(e).into(),
        }
    }

    fn publish(
        &self,
        seq: u64,
    ) {
        self.commit_tx.send_replace(seq);
    }
}

fn decode_seq(bytes: &[u8]) -> std::result::Result<u64, StorageError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corruption {
        location: "commit sequence counter".to_string(),
    })?;
    Ok(u64::from_be_bytes(raw))
}

impl DocumentStore for SledStore {
    fn insert(
        &self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<bool> {
        let dk = Self::doc_key(collection, key);
        let outcome = (&self.docs, &self.commits).transaction(|(docs, commits)| {
            if docs.get(dk.as_slice())?.is_some() {
                return Ok(None);
            }
            docs.insert(dk.as_slice(), value.clone())?;
            let seq = Self::append_batch(commits, collection, vec![key.to_string()])?;
            Ok(Some(seq))
        });

        match outcome {
            Ok(Some(seq)) => {
                self.publish(seq);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(Self::tx_error(e)),
        }
    }

    fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let mut prefix = Vec::with_capacity(collection.len() + 1);
        prefix.extend_from_slice(collection.as_bytes());
        prefix.push(DOC_KEY_SEPARATOR);

        let mut out = Vec::new();
        for item in self.docs.scan_prefix(&prefix) {
            let (k, v) = item?;
            let key = String::from_utf8(k[prefix.len()..].to_vec()).map_err(|_| {
                StorageError::Corruption {
                    location: format!("document key in {collection}"),
                }
            })?;
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }

    fn remove_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<Vec<String>> {
        let outcome = (&self.docs, &self.commits).transaction(|(docs, commits)| {
            let mut removed = Vec::new();
            for key in keys {
                let dk = Self::doc_key(collection, key);
                if docs.remove(dk)?.is_some() {
                    removed.push(key.clone());
                }
            }
            if removed.is_empty() {
                return Ok((removed, None));
            }
            let seq = Self::append_batch(commits, collection, removed.clone())?;
            Ok((removed, Some(seq)))
        });

        match outcome {
            Ok((removed, seq)) => {
                if let Some(seq) = seq {
                    self.publish(seq);
                }
                Ok(removed)
            }
            Err(e) => Err(Self::tx_error(e)),
        }
    }
}

impl CommitLog for SledStore {
    fn batches_after(
        &self,
        seq: u64,
    ) -> Result<Vec<ChangeBatch>> {
        let Some(start) = seq.checked_add(1) else {
            return Ok(Vec::new());
        };
        let start_key = Self::seq_to_key(start);

        let mut out = Vec::new();
        for item in self.commits.range(&start_key[..]..) {
            let (_, v) = item?;
            let batch: ChangeBatch =
                bincode::deserialize(&v).map_err(StorageError::Bincode)?;
            out.push(batch);
        }
        Ok(out)
    }

    fn last_seq(&self) -> u64 {
        match self.commits.get(COMMIT_SEQ_KEY) {
            Ok(Some(ivec)) => decode_seq(&ivec).unwrap_or_else(|e| {
                warn!(error = %e, "invalid commit sequence counter");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "failed to read commit sequence counter");
                0
            }
        }
    }

    fn commit_signal(&self) -> watch::Receiver<u64> {
        self.commit_tx.subscribe()
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("docs_len", &self.docs.len())
            .field("commits_len", &self.commits.len())
            .finish()
    }
}

impl Drop for SledStore {
    fn drop(&mut self) {
        match self.docs.flush().and_then(|_| self.commits.flush()) {
            Ok(_) => info!("flushed store on drop"),
            Err(e) => error!(?e, "failed to flush store on drop"),
        }
    }
}
