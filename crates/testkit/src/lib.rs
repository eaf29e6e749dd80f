//! Test support for eventseq.
//!
//! [`InMemoryProvider`] stands in for the provider's event log, including
//! the delay between an event being created and it showing up in list
//! responses. [`FakeExporter`] writes snapshot files from its contents.
//! The [`event_log_checks!`] macro runs the list-endpoint contract against
//! any [`TestableEventLog`].

pub mod checks;
pub mod exporter;
pub mod fixtures;
pub mod provider;
pub mod suite;
pub mod traits;

pub use exporter::FakeExporter;
pub use provider::InMemoryProvider;
pub use traits::TestableEventLog;
