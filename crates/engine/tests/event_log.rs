//! List-endpoint checks against the in-memory provider.

use std::time::Duration;

use eventseq_testkit::{event_log_checks, InMemoryProvider};

event_log_checks!(InMemoryProvider::with_lag(Duration::from_millis(800)));
