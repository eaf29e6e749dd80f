//! The timeline contract: tag, assert and write steps.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::StepError;
use crate::state::{RunState, StateDelta};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A write action. Receives a copy of the run state, returns new ids.
pub type WriteFn =
    Box<dyn Fn(RunState) -> BoxFuture<'static, Result<StateDelta, StepError>> + Send + Sync>;

/// A side-effect-free check against provider state.
pub type AssertFn = Box<dyn Fn(RunState) -> BoxFuture<'static, Result<(), StepError>> + Send + Sync>;

/// An ordered list of steps. Consumed once per run.
pub type Timeline = Vec<Step>;

/// One unit of a timeline.
pub enum Step {
    /// Names the next write step. At most one may be pending.
    Tag(String),
    /// Verifies provider state. Must not produce events.
    Assert(AssertFn),
    /// Mutates provider state and declares the events that must result.
    Write(WriteStep),
}

pub struct WriteStep {
    /// Event types the action must produce, in provider order.
    pub events: Vec<String>,
    /// When false, `events` is compared as a multiset.
    pub ensure_order: bool,
    pub action: WriteFn,
}

impl WriteStep {
    fn new<I, S, F, Fut>(events: I, ensure_order: bool, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(RunState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateDelta, StepError>> + Send + 'static,
    {
        WriteStep {
            events: events.into_iter().map(Into::into).collect(),
            ensure_order,
            action: Box::new(move |state| Box::pin(action(state))),
        }
    }
}

impl Step {
    pub fn tag(label: impl Into<String>) -> Self {
        Step::Tag(label.into())
    }

    pub fn assert<F, Fut>(check: F) -> Self
    where
        F: Fn(RunState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Step::Assert(Box::new(move |state| Box::pin(check(state))))
    }

    /// A write whose events must arrive in exactly the listed order.
    pub fn write<I, S, F, Fut>(events: I, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(RunState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateDelta, StepError>> + Send + 'static,
    {
        Step::Write(WriteStep::new(events, true, action))
    }

    /// A write whose events may arrive in any order.
    ///
    /// Needed when one call fans out into several events whose relative
    /// order the provider does not guarantee (intent state cascades).
    pub fn write_unordered<I, S, F, Fut>(events: I, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(RunState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateDelta, StepError>> + Send + 'static,
    {
        Step::Write(WriteStep::new(events, false, action))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Tag(_) => "tag",
            Step::Assert(_) => "assert",
            Step::Write(_) => "write",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Tag(label) => f.debug_tuple("Tag").field(label).finish(),
            Step::Assert(_) => f.write_str("Assert(..)"),
            Step::Write(write) => f
                .debug_struct("Write")
                .field("events", &write.events)
                .field("ensure_order", &write.ensure_order)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_defaults_to_ordered() {
        let step = Step::write(["customer.created"], |_| async { Ok(StateDelta::new()) });
        match step {
            Step::Write(w) => {
                assert!(w.ensure_order);
                assert_eq!(w.events, vec!["customer.created"]);
            }
            other => panic!("expected write, got {:?}", other),
        }
    }

    #[test]
    fn write_unordered_clears_ordering() {
        let step = Step::write_unordered(
            ["setup_intent.succeeded", "payment_method.attached"],
            |_| async { Ok(StateDelta::new()) },
        );
        assert!(matches!(step, Step::Write(ref w) if !w.ensure_order));
    }

    #[test]
    fn debug_hides_closures() {
        let timeline: Timeline = vec![
            Step::tag("c"),
            Step::assert(|_| async { Ok(()) }),
            Step::write(["a"], |_| async { Ok(StateDelta::new()) }),
        ];
        let kinds: Vec<_> = timeline.iter().map(Step::kind).collect();
        assert_eq!(kinds, ["tag", "assert", "write"]);
        assert_eq!(format!("{:?}", timeline[0]), "Tag(\"c\")");
        assert_eq!(format!("{:?}", timeline[1]), "Assert(..)");
    }

    #[tokio::test]
    async fn action_receives_state_copy() {
        let step = Step::write(["a"], |state: RunState| async move {
            let c = state.get("c_1")?.to_string();
            Ok(StateDelta::new().with("seen", c))
        });
        let Step::Write(write) = step else {
            panic!("expected write")
        };

        let mut state = RunState::new();
        state.merge(StateDelta::new().with("c_1", "cus_1"));
        let delta = (write.action)(state.clone()).await.unwrap();
        assert_eq!(delta, StateDelta::new().with("seen", "cus_1"));
        assert_eq!(state.len(), 1);
    }
}
