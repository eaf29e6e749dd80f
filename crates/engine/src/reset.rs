//! Empty-account precondition for normal runs.
//!
//! Fixtures assume the run owns the whole event log, so a run starts only
//! once the provider reports no events at all.

use std::time::Duration;

use async_trait::async_trait;
use eventseq_provider::EventLog;
use tokio::process::Command;

use crate::error::EngineError;
use crate::fetch::EventFetcher;
use crate::snapshot::run_checked;
use crate::wait::{wait_for, Probe, WaitError, WaitPolicy};

/// Deletes all test data in the provider account.
#[async_trait]
pub trait AccountReset: Send + Sync {
    async fn reset(&self) -> Result<(), EngineError>;
}

/// Runs a shell command that clears the account.
#[derive(Debug, Clone)]
pub struct CommandReset {
    command: String,
}

impl CommandReset {
    pub fn new(command: impl Into<String>) -> Self {
        CommandReset {
            command: command.into(),
        }
    }
}

#[async_trait]
impl AccountReset for CommandReset {
    async fn reset(&self) -> Result<(), EngineError> {
        tracing::info!(command = %self.command, "resetting account");
        run_checked(
            Command::new("sh").arg("-c").arg(&self.command),
            "reset command",
        )
        .await
        .map_err(|e| match e {
            EngineError::Export(message) => EngineError::Reset(message),
            other => other,
        })
    }
}

/// Default wait for the log to drain after a reset.
pub const RESET_POLICY: WaitPolicy =
    WaitPolicy::new(Duration::from_secs(2), Duration::from_secs(60));

/// Make sure the event log is empty, resetting the account if needed.
///
/// Fails with [`EngineError::Reset`] when the account has events and no
/// reset is configured, or when the log is still non-empty after `policy`.
pub async fn ensure_empty_account(
    log: &dyn EventLog,
    reset: Option<&dyn AccountReset>,
    policy: WaitPolicy,
) -> Result<(), EngineError> {
    let fetcher = EventFetcher::new(log);
    if fetcher.latest_event_id().await?.is_none() {
        tracing::debug!("account is empty");
        return Ok(());
    }

    let Some(reset) = reset else {
        return Err(EngineError::Reset(
            "account has events and no reset command is configured".to_string(),
        ));
    };
    reset.reset().await?;

    let fetcher = &fetcher;
    let drained = wait_for(policy, move || async move {
        let latest = fetcher.latest_event_id().await?;
        Ok::<_, EngineError>(match latest {
            None => Probe::Ready(None),
            Some(id) => Probe::Pending(Some(id)),
        })
    })
    .await;

    match drained {
        Ok(_) => {
            tracing::info!("account reset complete");
            Ok(())
        }
        Err(WaitError::Probe(e)) => Err(e),
        Err(WaitError::TimedOut { last, elapsed }) => Err(EngineError::Reset(format!(
            "event log still not empty after {}ms (latest event {})",
            elapsed.as_millis(),
            last.flatten().unwrap_or_default()
        ))),
    }
}
