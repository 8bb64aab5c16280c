use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::trace;

use crate::utils::retry_with_backoff;
use crate::CommitLog;
use crate::Error;
use crate::Multiplexer;
use crate::Result;
use crate::StorageError;
use crate::TailerConfig;
use crate::WatchError;

/// Reads the store's commit stream and republishes it, in commit
/// order, to the multiplexer.
///
/// At-least-once semantics: a transient read fault is retried with
/// backoff rather than skipping a batch; only after retries are
/// exhausted does the tailer stop and fail every watcher. The tailer
/// itself carries no per-watcher state and never blocks on a slow
/// consumer — burstiness is absorbed by the coalescing slots
/// downstream.
pub struct CommitTailer<L: CommitLog> {
    log: Arc<L>,
    mux: Multiplexer,
    cursor: u64,
    shutdown: watch::Receiver<()>,
    config: TailerConfig,
}

impl<L: CommitLog> CommitTailer<L> {
    /// The cursor starts at the log's current head: history from
    /// before the connection opened is covered by each watcher's
    /// initial pulse.
    pub fn new(
        log: Arc<L>,
        mux: Multiplexer,
        shutdown: watch::Receiver<()>,
        config: TailerConfig,
    ) -> Self {
        let cursor = log.last_seq();
        Self {
            log,
            mux,
            cursor,
            shutdown,
            config,
        }
    }

    /// Runs until the shutdown signal fires or the log faults
    /// terminally. Consumes the tailer; spawn it on its own task.
    pub async fn run(mut self) {
        let mut shutdown = self.shutdown.clone();
        let mut commits = self.log.commit_signal();

        debug!(cursor = self.cursor, "commit log tailer started");

        // Covers commits that landed between construction and spawn.
        if let Err(e) = self.drain().await {
            self.fail(e);
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("commit log tailer shutting down");
                    return;
                }

                changed = commits.changed() => {
                    if changed.is_err() {
                        self.fail(StorageError::Db("commit signal closed".to_string()).into());
                        return;
                    }
                    if let Err(e) = self.drain().await {
                        self.fail(e);
                        return;
                    }
                }
            }
        }
    }

    /// Reads everything past the cursor and dispatches it in order.
    async fn drain(&mut self) -> Result<()> {
        let log = self.log.clone();
        let after = self.cursor;

        let batches = retry_with_backoff(
            "commit-log-read",
            || log.batches_after(after),
            self.config.max_read_retries,
            self.config.initial_backoff(),
            self.config.max_backoff(),
        )
        .await?;

        for batch in batches {
            trace!(seq = batch.seq, keys = batch.keys.len(), "batch read");
            if batch.seq > self.cursor {
                self.cursor = batch.seq;
            }
            self.mux.dispatch(&batch);
        }
        Ok(())
    }

    fn fail(
        &self,
        e: Error,
    ) {
        error!(error = %e, "commit log tailer failed");
        self.mux.fail_all(WatchError::TailerFailed(e.to_string()));
    }
}
