//! Fixed-interval polling.
//!
//! The provider's read-after-write lag is roughly constant, so the interval
//! never grows. Dropping a wait future cancels it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        WaitPolicy { interval, timeout }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::new(Duration::from_millis(500), Duration::from_secs(10))
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// Condition met; the wait returns this value.
    Ready(T),
    /// Not yet; kept as the last observation for the timeout report.
    Pending(T),
}

#[derive(Debug)]
pub enum WaitError<T, E> {
    TimedOut { last: Option<T>, elapsed: Duration },
    Probe(E),
}

/// Poll `probe` every `policy.interval` until it reports [`Probe::Ready`].
///
/// The probe always runs at least once. Probe errors end the wait
/// immediately; only "not yet" is retried.
pub async fn wait_for<T, E, F, Fut>(policy: WaitPolicy, mut probe: F) -> Result<T, WaitError<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let last = match probe().await.map_err(WaitError::Probe)? {
            Probe::Ready(value) => return Ok(value),
            Probe::Pending(value) => value,
        };

        sleep(policy.interval).await;
        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            tracing::debug!(attempts, ?elapsed, "wait timed out");
            return Err(WaitError::TimedOut {
                last: Some(last),
                elapsed,
            });
        }
    }
}

/// Sleep until `deadline`. Returns immediately if it has passed.
pub async fn wait_until(deadline: Instant) {
    sleep_until(deadline).await;
}
