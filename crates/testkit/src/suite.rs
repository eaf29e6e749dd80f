//! The `event_log_checks!` macro.
//!
//! ```rust,ignore
//! use eventseq_testkit::{event_log_checks, InMemoryProvider};
//!
//! event_log_checks!(InMemoryProvider::with_lag(std::time::Duration::from_millis(800)));
//! ```
//!
//! The calling crate needs tokio's `test-util` feature: the generated tests
//! run with a paused clock.

/// Generate one `#[tokio::test]` per list-endpoint check.
///
/// `$log_expr` is evaluated fresh for each test.
#[macro_export]
macro_rules! event_log_checks {
    ($log_expr:expr) => {
        #[tokio::test(start_paused = true)]
        async fn event_log_lists_newest_first() {
            let log = $log_expr;
            $crate::checks::newest_first::check_newest_first(&log)
                .await
                .expect("newest-first listing");
        }

        #[tokio::test(start_paused = true)]
        async fn event_log_pages_with_starting_after() {
            let log = $log_expr;
            $crate::checks::starting_after::check_starting_after(&log)
                .await
                .expect("starting_after paging");
        }

        #[tokio::test(start_paused = true)]
        async fn event_log_pages_with_ending_before() {
            let log = $log_expr;
            $crate::checks::ending_before::check_ending_before(&log)
                .await
                .expect("ending_before paging");
        }

        #[tokio::test(start_paused = true)]
        async fn event_log_filters_by_created() {
            let log = $log_expr;
            $crate::checks::created_filter::check_created_filter(&log)
                .await
                .expect("created[gte] filter");
        }
    };
}
