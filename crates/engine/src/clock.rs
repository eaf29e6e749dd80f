use std::time::{SystemTime, UNIX_EPOCH};

/// Source of provider-comparable wall-clock time (unix seconds).
///
/// Timestamp fences compare against event `created` values, so tests
/// substitute the fake provider's clock here.
pub trait Clock: Send + Sync {
    fn unix_now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
