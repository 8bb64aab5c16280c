use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use super::*;
use crate::test_utils::assert_no_pulse;
use crate::test_utils::assert_one_pulse;
use crate::ChangeBatch;
use crate::DocumentStore;
use crate::MemoryStore;
use crate::MockCommitLog;
use crate::Multiplexer;
use crate::StorageError;
use crate::TailerConfig;
use crate::WatchError;
use crate::WatchState;
use crate::REMOVALS_COLLECTION;

fn fast_config() -> TailerConfig {
    TailerConfig {
        max_read_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
    }
}

fn removal_batch(
    seq: u64,
    key: &str,
) -> ChangeBatch {
    ChangeBatch {
        seq,
        collection: REMOVALS_COLLECTION.to_string(),
        keys: vec![key.to_string()],
    }
}

#[tokio::test]
async fn dispatches_commits_in_order_to_watchers() {
    let store = Arc::new(MemoryStore::new());
    let mux = Multiplexer::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let tailer = CommitTailer::new(
        store.clone(),
        mux.clone(),
        shutdown_rx,
        TailerConfig::default(),
    );
    let task = tokio::spawn(tailer.run());

    let mut watcher = mux.register(REMOVALS_COLLECTION, None);
    assert_one_pulse(&mut watcher).await;

    store.insert(REMOVALS_COLLECTION, "m1", vec![]).unwrap();
    assert_one_pulse(&mut watcher).await;

    store.insert(REMOVALS_COLLECTION, "m2", vec![]).unwrap();
    assert_one_pulse(&mut watcher).await;

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(1), task)
        .await
        .expect("tailer did not honor shutdown")
        .unwrap();

    // Shutdown alone leaves watchers alive; the connection stops
    // them explicitly during teardown.
    assert_eq!(watcher.state(), WatchState::Running);
}

#[tokio::test]
async fn starts_from_the_current_log_head() {
    let store = Arc::new(MemoryStore::new());
    store.insert(REMOVALS_COLLECTION, "old", vec![]).unwrap();

    let mux = Multiplexer::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let tailer = CommitTailer::new(
        store.clone(),
        mux.clone(),
        shutdown_rx,
        TailerConfig::default(),
    );
    tokio::spawn(tailer.run());

    let mut watcher = mux.register(REMOVALS_COLLECTION, None);
    assert_one_pulse(&mut watcher).await;

    // The pre-existing commit is not replayed...
    assert_no_pulse(&mut watcher).await;

    // ...but new commits flow through.
    store.insert(REMOVALS_COLLECTION, "new", vec![]).unwrap();
    assert_one_pulse(&mut watcher).await;
}

#[tokio::test]
async fn transient_read_faults_are_retried() {
    let mut log = MockCommitLog::new();
    log.expect_last_seq().return_const(0u64);

    let (commit_tx, commit_rx) = watch::channel(0u64);
    log.expect_commit_signal().return_once(move || commit_rx);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    log.expect_batches_after().returning(move |_| {
        match counter.fetch_add(1, Ordering::SeqCst) {
            // Startup drain finds nothing.
            0 => Ok(Vec::new()),
            // First real read hiccups...
            1 => Err(StorageError::Db("transient read fault".to_string()).into()),
            // ...and the retry delivers the batch.
            _ => Ok(vec![removal_batch(1, "m1")]),
        }
    });

    let mux = Multiplexer::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let tailer = CommitTailer::new(Arc::new(log), mux.clone(), shutdown_rx, fast_config());
    let task = tokio::spawn(tailer.run());

    let mut watcher = mux.register(REMOVALS_COLLECTION, None);
    assert_one_pulse(&mut watcher).await;

    commit_tx.send(1).unwrap();
    assert_one_pulse(&mut watcher).await;

    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(watcher.err(), None);

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn exhausted_retries_fail_every_watcher() {
    let mut log = MockCommitLog::new();
    log.expect_last_seq().return_const(0u64);

    let (_commit_tx, commit_rx) = watch::channel(0u64);
    log.expect_commit_signal().return_once(move || commit_rx);

    log.expect_batches_after()
        .returning(|_| Err(StorageError::Db("log segment corrupted".to_string()).into()));

    let mux = Multiplexer::new();
    let watcher = mux.register(REMOVALS_COLLECTION, None);

    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let tailer = CommitTailer::new(Arc::new(log), mux.clone(), shutdown_rx, fast_config());
    let task = tokio::spawn(tailer.run());

    let outcome = timeout(Duration::from_secs(2), watcher.wait())
        .await
        .expect("watcher was not failed by the dying tailer");
    match outcome {
        Err(WatchError::TailerFailed(msg)) => {
            assert!(msg.contains("log segment corrupted"), "message was {msg:?}");
        }
        other => panic!("unexpected watcher outcome: {other:?}"),
    }

    assert_eq!(mux.watcher_count(), 0);
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_commit_signal_is_fatal() {
    let mut log = MockCommitLog::new();
    log.expect_last_seq().return_const(0u64);

    let (commit_tx, commit_rx) = watch::channel(0u64);
    log.expect_commit_signal().return_once(move || commit_rx);
    log.expect_batches_after().returning(|_| Ok(Vec::new()));

    let mux = Multiplexer::new();
    let watcher = mux.register(REMOVALS_COLLECTION, None);

    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let tailer = CommitTailer::new(Arc::new(log), mux.clone(), shutdown_rx, fast_config());
    let task = tokio::spawn(tailer.run());

    drop(commit_tx);

    let outcome = timeout(Duration::from_secs(2), watcher.wait())
        .await
        .expect("watcher was not failed after the signal closed");
    assert!(matches!(outcome, Err(WatchError::TailerFailed(_))));

    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}
