use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::Result;

/// Runs `op` until it succeeds or `max_attempts` have failed,
/// sleeping a jittered, exponentially growing delay between
/// attempts. Returns the last error once attempts are exhausted.
pub(crate) async fn retry_with_backoff<F, T>(
    op_name: &str,
    mut op: F,
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!(op_name, attempt, "giving up after repeated failures: {e}");
                return Err(e);
            }
            Err(e) => {
                warn!(op_name, attempt, "attempt failed, backing off: {e}");
                sleep(jittered(delay)).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// ±50% jitter keeps concurrent retriers from thundering in step.
fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}
