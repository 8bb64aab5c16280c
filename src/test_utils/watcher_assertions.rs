use std::time::Duration;

use tokio::time::timeout;

use crate::NotifyWatcher;

/// Generous ceiling for events that must arrive.
pub(crate) const PULSE_WAIT: Duration = Duration::from_secs(2);

/// Grace window in which nothing further may arrive.
pub(crate) const QUIET_WAIT: Duration = Duration::from_millis(100);

/// Asserts exactly one pulse is pending: one arrives, then the
/// channel stays quiet for the grace window.
pub(crate) async fn assert_one_pulse(watcher: &mut NotifyWatcher) {
    timeout(PULSE_WAIT, watcher.changes().recv())
        .await
        .expect("timed out waiting for a pulse")
        .expect("pulse channel closed while waiting for a pulse");
    assert_no_pulse(watcher).await;
}

/// Asserts nothing arrives on the pulse channel within the grace
/// window.
pub(crate) async fn assert_no_pulse(watcher: &mut NotifyWatcher) {
    let extra = timeout(QUIET_WAIT, watcher.changes().recv()).await;
    assert!(extra.is_err(), "unexpected pulse delivery: {extra:?}");
}

/// Asserts the pulse channel reports closed, draining any pulse that
/// was already buffered when the watcher stopped.
pub(crate) async fn assert_closed(watcher: &mut NotifyWatcher) {
    loop {
        match timeout(PULSE_WAIT, watcher.changes().recv()).await {
            Ok(None) => return,
            Ok(Some(())) => continue,
            Err(_) => panic!("timed out waiting for the pulse channel to close"),
        }
    }
}
