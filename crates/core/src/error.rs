/// Errors raised by a timeline's own actions and assertions.
///
/// These are failures of the timeline contract (a missing state key, an
/// assertion about provider behaviour that did not hold), or provider calls
/// that failed while the action was running.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A step read a state key that no earlier write step produced.
    #[error("run state has no value for '{key}'")]
    MissingState { key: String },

    /// A call the timeline expected the provider to reject was accepted.
    #[error("expected the provider to reject {call}, but it succeeded")]
    UnexpectedSuccess { call: String },

    /// An equality or shape assertion embedded in the timeline failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A provider call made by the step failed.
    #[error("provider call failed: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StepError {
    pub fn assertion(message: impl Into<String>) -> Self {
        StepError::Assertion(message.into())
    }
}

/// Fail with [`StepError::Assertion`] unless `left == right`.
pub fn ensure_eq<T: PartialEq + std::fmt::Debug>(
    left: &T,
    right: &T,
    what: &str,
) -> Result<(), StepError> {
    if left == right {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{}: {:?} != {:?}",
            what, left, right
        )))
    }
}
