use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;

use crate::Result;

#[cfg(test)]
use mockall::automock;

/// The document keys affected by one atomic commit.
///
/// Sequence numbers are strictly increasing per store; the tailer
/// relies on that to deliver batches in commit order and to resume
/// from a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Position in the store's commit order.
    pub seq: u64,
    /// Collection the affected documents belong to.
    pub collection: String,
    /// Keys touched by the commit.
    pub keys: Vec<String>,
}

/// Read side of a store's ordered change capture.
#[cfg_attr(test, automock)]
pub trait CommitLog: Send + Sync + 'static {
    /// Batches with sequence strictly greater than `seq`, in
    /// ascending sequence order. A non-blocking poll: an empty vec
    /// means nothing new has committed.
    fn batches_after(
        &self,
        seq: u64,
    ) -> Result<Vec<ChangeBatch>>;

    /// Sequence of the newest committed batch, `0` if none.
    fn last_seq(&self) -> u64;

    /// Wakeup channel carrying the newest committed sequence. The
    /// value is only a hint; readers drain via [`batches_after`].
    ///
    /// [`batches_after`]: CommitLog::batches_after
    fn commit_signal(&self) -> watch::Receiver<u64>;
}
