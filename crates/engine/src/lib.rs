//! eventseq-engine: runs timelines against a provider and records fixtures.
//!
//! - [`wait`] -- fixed-interval polling with a bounded timeout
//! - [`fetch`] -- event log reads, fences and convergence waits
//! - [`snapshot`] -- account export bracketed by event-log fences
//! - [`runner`] -- the step state machine, normal and discovery mode
//! - [`fixture`] -- on-disk bundle and human-readable reports
//! - [`reset`] -- empty-account precondition

pub mod clock;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod fixture;
pub mod reset;
pub mod runner;
pub mod snapshot;
pub mod wait;

pub use clock::{Clock, SystemClock};
pub use error::EngineError;
pub use fetch::{EventFetcher, Fence};
pub use fixture::{render_discovery, render_steps_md, verify_bundle, BundleSummary, FixtureWriter};
pub use reset::{ensure_empty_account, AccountReset, CommandReset, RESET_POLICY};
pub use runner::{DiscoveredStep, RecordedStep, RunOptions, RunPhase, RunRecord, Runner};
pub use snapshot::{CommandExporter, Snapshot, SnapshotExporter, Snapshotter};
pub use wait::{wait_for, wait_until, Probe, WaitError, WaitPolicy};
