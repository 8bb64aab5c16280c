use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::retry::retry_with_backoff;
use crate::Error;
use crate::StorageError;

const TINY: Duration = Duration::from_millis(1);

fn transient() -> Error {
    StorageError::Db("transient".to_string()).into()
}

#[tokio::test]
async fn first_success_needs_no_retry() {
    let attempts = AtomicUsize::new(0);

    let value = retry_with_backoff(
        "test-op",
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        },
        5,
        TINY,
        TINY,
    )
    .await
    .unwrap();

    assert_eq!(value, 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let attempts = AtomicUsize::new(0);

    let value = retry_with_backoff(
        "test-op",
        || {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok("done")
            }
        },
        5,
        TINY,
        TINY,
    )
    .await
    .unwrap();

    assert_eq!(value, "done");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts_with_the_last_error() {
    let attempts = AtomicUsize::new(0);

    let outcome: crate::Result<()> = retry_with_backoff(
        "test-op",
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        },
        3,
        TINY,
        TINY,
    )
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(matches!(
        outcome,
        Err(Error::Storage(StorageError::Db(_)))
    ));
}
