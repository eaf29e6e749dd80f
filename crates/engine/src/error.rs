use std::path::PathBuf;

use eventseq_core::StepError;
use eventseq_provider::ProviderError;

/// Everything that can abort a timeline run.
///
/// None of these are retried: a run either reconciles completely or
/// produces no bundle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A tag step followed another tag with no write in between.
    #[error("tag '{next}' set while tag '{pending}' is still pending; a write step must consume it first")]
    DoubleTag { pending: String, next: String },

    /// The timeline ended with a tag that no write step consumed.
    #[error("tag '{0}' was never consumed by a write step")]
    DanglingTag(String),

    /// Expected event types never appeared after a write.
    #[error(
        "timed out after {waited_ms}ms waiting for events (ensure_order={ensure_order})\n{diff}"
    )]
    ConvergenceTimeout {
        expected: Vec<String>,
        observed: Vec<String>,
        ensure_order: bool,
        waited_ms: u128,
        diff: String,
    },

    /// The event log moved while the account export was running.
    #[error("events were created during snapshot export (last event before: {before:?}, after: {after:?})")]
    SnapshotDrift {
        before: Option<String>,
        after: Option<String>,
    },

    /// Per-step event counts do not add up to the provider's full log.
    #[error("event log reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("snapshot export failed: {0}")]
    Export(String),

    #[error("account reset failed: {0}")]
    Reset(String),

    /// A timeline action or assertion failed.
    #[error("step {index} ({kind}) failed: {source}")]
    Step {
        index: usize,
        kind: &'static str,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
