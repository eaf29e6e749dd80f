//! eventseq-core: data model for the eventseq timeline harness.
//!
//! A [`Timeline`] is an ordered list of [`Step`]s. Running it against a live
//! provider account produces a [`RunStep`] per write step plus the provider's
//! [`Event`] log; together they form a fixture bundle.
//!
//! This crate has no I/O. The provider client lives in `eventseq-provider`,
//! the runner and fixture writer in `eventseq-engine`.

pub mod error;
pub mod event;
pub mod record;
pub mod state;
pub mod step;

pub use error::{ensure_eq, StepError};
pub use event::{Event, EventData};
pub use record::{verify_partition, EventsDocument, RunStep, StepsDocument};
pub use state::{RunState, StateDelta};
pub use step::{AssertFn, BoxFuture, Step, Timeline, WriteFn, WriteStep};
