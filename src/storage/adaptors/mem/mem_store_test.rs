use super::*;
use crate::CommitLog;
use crate::DocumentStore;

const COLL: &str = "machine-removals";

#[test]
fn insert_reports_created_exactly_once() {
    let store = MemoryStore::new();

    assert!(store.insert(COLL, "m1", vec![1]).unwrap());
    assert!(!store.insert(COLL, "m1", vec![2]).unwrap());

    assert_eq!(store.doc_count(COLL), 1);
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn mutations_append_strictly_ordered_batches() {
    let store = MemoryStore::new();

    store.insert(COLL, "m1", vec![]).unwrap();
    store.insert(COLL, "m2", vec![]).unwrap();
    store
        .remove_many(COLL, &["m1".to_string()])
        .unwrap();

    let batches = store.batches_after(0).unwrap();
    let seqs: Vec<u64> = batches.iter().map(|b| b.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    assert_eq!(batches[0].collection, COLL);
    assert_eq!(batches[0].keys, vec!["m1"]);
    assert_eq!(batches[2].keys, vec!["m1"]);
    assert_eq!(store.last_seq(), 3);
}

#[test]
fn remove_of_absent_keys_commits_nothing() {
    let store = MemoryStore::new();

    let removed = store
        .remove_many(COLL, &["ghost".to_string()])
        .unwrap();

    assert!(removed.is_empty());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.last_seq(), 0);
}

#[test]
fn remove_many_coalesces_into_one_batch() {
    let store = MemoryStore::new();

    store.insert(COLL, "m1", vec![]).unwrap();
    store.insert(COLL, "m2", vec![]).unwrap();

    let removed = store
        .remove_many(COLL, &["m1".to_string(), "m2".to_string(), "m3".to_string()])
        .unwrap();
    assert_eq!(removed, vec!["m1", "m2"]);

    let batches = store.batches_after(2).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].keys, vec!["m1", "m2"]);
}

#[test]
fn batches_after_skips_consumed_prefix() {
    let store = MemoryStore::new();

    store.insert(COLL, "m1", vec![]).unwrap();
    store.insert(COLL, "m2", vec![]).unwrap();
    store.insert(COLL, "m3", vec![]).unwrap();

    let batches = store.batches_after(1).unwrap();
    let seqs: Vec<u64> = batches.iter().map(|b| b.seq).collect();
    assert_eq!(seqs, vec![2, 3]);

    assert!(store.batches_after(3).unwrap().is_empty());
}

#[test]
fn list_returns_current_documents() {
    let store = MemoryStore::new();

    store.insert(COLL, "m1", vec![10]).unwrap();
    store.insert(COLL, "m2", vec![20]).unwrap();
    store.remove_many(COLL, &["m1".to_string()]).unwrap();

    let docs = store.list(COLL).unwrap();
    assert_eq!(docs, vec![("m2".to_string(), vec![20])]);

    assert!(store.list("other-collection").unwrap().is_empty());
}

#[tokio::test]
async fn commit_signal_wakes_on_every_commit() {
    let store = MemoryStore::new();
    let mut signal = store.commit_signal();

    store.insert(COLL, "m1", vec![]).unwrap();
    signal.changed().await.unwrap();
    assert_eq!(*signal.borrow_and_update(), 1);

    // A no-op mutation raises no signal.
    store.insert(COLL, "m1", vec![]).unwrap();
    assert!(!signal.has_changed().unwrap());
}
