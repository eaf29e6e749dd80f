//! List-endpoint contract checks, one file per property.
//!
//! Each check takes a fresh, empty [`TestableEventLog`](crate::TestableEventLog)
//! and returns a description of the first violation.

pub mod created_filter;
pub mod ending_before;
pub mod newest_first;
pub mod starting_after;
