//! Point-in-time account exports.
//!
//! An export is not atomic from our side, so every export is bracketed by
//! two reads of the latest event id. If they differ the snapshot may mix
//! states and the run is aborted.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use eventseq_provider::EventLog;
use serde_json::json;
use tempfile::TempPath;
use tokio::process::Command;

use crate::error::EngineError;
use crate::fetch::{EventFetcher, Fence};

/// Writes a full export of the provider account to `dest`.
#[async_trait]
pub trait SnapshotExporter: Send + Sync {
    async fn export(&self, dest: &Path) -> Result<(), EngineError>;
}

/// Exports by running an external download binary.
///
/// The binary is invoked as `<binary> --json '<command>'` where the command
/// asks for a one-shot download of the account into a SQLite file. An
/// optional build command runs first so the binary is always current.
#[derive(Debug, Clone)]
pub struct CommandExporter {
    binary: PathBuf,
    build_command: Option<String>,
    secret_key: String,
}

impl CommandExporter {
    pub fn new(binary: impl Into<PathBuf>, secret_key: impl Into<String>) -> Self {
        CommandExporter {
            binary: binary.into(),
            build_command: None,
            secret_key: secret_key.into(),
        }
    }

    pub fn with_build_command(mut self, command: impl Into<String>) -> Self {
        self.build_command = Some(command.into());
        self
    }

    /// The JSON command passed to the download binary.
    pub fn payload(&self, dest: &Path) -> serde_json::Value {
        json!({
            "cmd": {
                "fn": "download",
                "args": {
                    "from": { "stripe": { "secret_key": self.secret_key } },
                    "to": { "sqlite": { "file": dest.to_string_lossy() } },
                    "options": {
                        "watch": false,
                        "apply_events_after_one_shot_dl": false
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SnapshotExporter for CommandExporter {
    async fn export(&self, dest: &Path) -> Result<(), EngineError> {
        if let Some(build) = &self.build_command {
            tracing::info!(command = %build, "building exporter");
            run_checked(Command::new("sh").arg("-c").arg(build), "build command").await?;
        }

        tracing::info!(binary = %self.binary.display(), "running exporter");
        run_checked(
            Command::new(&self.binary)
                .arg("--json")
                .arg(self.payload(dest).to_string()),
            "exporter",
        )
        .await?;
        Ok(())
    }
}

pub(crate) async fn run_checked(command: &mut Command, what: &str) -> Result<(), EngineError> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| EngineError::Export(format!("failed to start {}: {}", what, e)))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(EngineError::Export(format!(
        "{} exited with {}: {}",
        what,
        output.status,
        stderr.trim()
    )))
}

/// A snapshot file plus the event fence it was taken at.
///
/// The file is temporary until [`persist`](Self::persist)ed; dropping an
/// unpersisted snapshot deletes it.
#[derive(Debug)]
pub struct Snapshot {
    path: TempPath,
    pub last_event_id: Option<String>,
}

impl Snapshot {
    pub(crate) fn from_temp(path: TempPath, last_event_id: Option<String>) -> Self {
        Snapshot {
            path,
            last_event_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fence(&self) -> Fence {
        Fence::from_latest(self.last_event_id.clone())
    }

    /// Move the snapshot to `dest`, copying if a rename is not possible.
    pub fn persist(self, dest: &Path) -> Result<(), EngineError> {
        match self.path.persist(dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                std::fs::copy(&e.path, dest).map_err(|err| EngineError::io(dest, err))?;
                Ok(())
            }
        }
    }
}

/// Takes bracketed snapshots into a scratch directory.
pub struct Snapshotter<'a> {
    fetcher: EventFetcher<'a>,
    exporter: &'a dyn SnapshotExporter,
    scratch_dir: PathBuf,
}

impl<'a> Snapshotter<'a> {
    pub fn new(
        log: &'a dyn EventLog,
        exporter: &'a dyn SnapshotExporter,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Snapshotter {
            fetcher: EventFetcher::new(log),
            exporter,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Export the account and check no event was created meanwhile.
    pub async fn capture(&self) -> Result<Snapshot, EngineError> {
        let before = self.fetcher.latest_event_id().await?;

        let path = tempfile::Builder::new()
            .prefix("dl-")
            .suffix(".snapshot")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| EngineError::io(&self.scratch_dir, e))?
            .into_temp_path();
        self.exporter.export(&path).await?;

        let after = self.fetcher.latest_event_id().await?;
        if before != after {
            return Err(EngineError::SnapshotDrift { before, after });
        }

        tracing::info!(file = %path.display(), last_event = ?after, "snapshot exported");
        Ok(Snapshot::from_temp(path, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_download_command() {
        let exporter = CommandExporter::new("/opt/dl/cli", "sk_test_123");
        let payload = exporter.payload(Path::new("/tmp/dl-1.snapshot"));
        assert_eq!(payload["cmd"]["fn"], "download");
        assert_eq!(
            payload["cmd"]["args"]["from"]["stripe"]["secret_key"],
            "sk_test_123"
        );
        assert_eq!(
            payload["cmd"]["args"]["to"]["sqlite"]["file"],
            "/tmp/dl-1.snapshot"
        );
        assert_eq!(payload["cmd"]["args"]["options"]["watch"], false);
    }

    #[tokio::test]
    async fn failing_build_command_reports_stderr() {
        let exporter = CommandExporter::new("/bin/true", "sk_test_123")
            .with_build_command("echo broken >&2; exit 3");
        let dir = tempfile::tempdir().unwrap();
        let err = exporter
            .export(&dir.path().join("out.snapshot"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("build command exited"), "{}", msg);
        assert!(msg.contains("broken"), "{}", msg);
    }

    #[tokio::test]
    async fn missing_binary_is_an_export_error() {
        let exporter = CommandExporter::new("/nonexistent/eventseq-exporter", "sk_test_123");
        let dir = tempfile::tempdir().unwrap();
        let err = exporter
            .export(&dir.path().join("out.snapshot"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Export(ref m) if m.contains("failed to start exporter")));
    }

    #[test]
    fn persist_moves_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp = tempfile::Builder::new()
            .tempfile_in(dir.path())
            .unwrap()
            .into_temp_path();
        std::fs::write(&temp, b"sqlite").unwrap();
        let snapshot = Snapshot {
            path: temp,
            last_event_id: None,
        };
        assert_eq!(snapshot.fence(), Fence::Start);

        let dest = dir.path().join("dl-step-0.snapshot");
        snapshot.persist(&dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"sqlite");
    }
}
