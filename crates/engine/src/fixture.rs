//! The on-disk fixture bundle.
//!
//! ```text
//! <data_dir>/<key>/
//!     downloads/dl-step-<n>.<ext>
//!     meta.json      {"steps": [...]}
//!     events.json    {"events": [...]}
//!     steps.md
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use eventseq_core::{verify_partition, Event, EventsDocument, RunStep, StepsDocument};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::EngineError;
use crate::fetch::event_types;
use crate::runner::{DiscoveredStep, RunRecord};

pub struct FixtureWriter {
    dir: PathBuf,
    snapshot_extension: String,
}

impl FixtureWriter {
    pub fn new(data_dir: impl AsRef<Path>, key: &str) -> Self {
        FixtureWriter {
            dir: data_dir.as_ref().join(key),
            snapshot_extension: "snapshot".to_string(),
        }
    }

    pub fn with_snapshot_extension(mut self, ext: impl Into<String>) -> Self {
        self.snapshot_extension = ext.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.join("downloads")
    }

    /// Remove any previous bundle and create an empty one.
    pub fn prepare(&self) -> Result<(), EngineError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        }
        let downloads = self.downloads_dir();
        fs::create_dir_all(&downloads).map_err(|e| EngineError::io(&downloads, e))?;
        Ok(())
    }

    /// Remove a partially written bundle.
    pub fn discard(&self) -> Result<(), EngineError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::io(&self.dir, e)),
        }
    }

    /// Persist snapshots, then write `meta.json`, `events.json` and `steps.md`.
    ///
    /// Returns the steps as written to `meta.json`.
    pub fn write(&self, record: RunRecord) -> Result<Vec<RunStep>, EngineError> {
        let downloads = self.downloads_dir();
        fs::create_dir_all(&downloads).map_err(|e| EngineError::io(&downloads, e))?;

        let mut steps = Vec::with_capacity(record.steps.len());
        for recorded in record.steps {
            let mut step = recorded.step;
            if let Some(snapshot) = recorded.snapshot {
                let rel = format!("downloads/dl-step-{}.{}", step.index, self.snapshot_extension);
                let dest = self.dir.join(&rel);
                snapshot.persist(&dest)?;
                step.snapshot_sha256 = Some(sha256_file(&dest)?);
                step.snapshot_file = Some(rel);
            }
            steps.push(step);
        }

        verify_partition(&steps, record.events.len()).map_err(EngineError::Reconciliation)?;

        self.write_json(
            "meta.json",
            "steps",
            &StepsDocument {
                steps: steps.clone(),
            },
        )?;
        self.write_json(
            "events.json",
            "events",
            &EventsDocument {
                events: record.events.clone(),
            },
        )?;
        let md_path = self.dir.join("steps.md");
        fs::write(&md_path, render_steps_md(&steps, &record.events))
            .map_err(|e| EngineError::io(&md_path, e))?;

        tracing::info!(dir = %self.dir.display(), steps = steps.len(), "bundle written");
        Ok(steps)
    }

    fn write_json<T: Serialize>(
        &self,
        name: &str,
        what: &'static str,
        value: &T,
    ) -> Result<(), EngineError> {
        let path = self.dir.join(name);
        let json = to_json_4(value).map_err(|source| EngineError::Json { what, source })?;
        fs::write(&path, json).map_err(|e| EngineError::io(&path, e))
    }
}

/// What [`verify_bundle`] found in a valid bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub steps: usize,
    pub events: usize,
    pub snapshots: usize,
}

/// Re-check a bundle on disk.
///
/// The steps must partition the event log, each step's `event_types` must
/// match the events it points at, and every snapshot must exist with the
/// recorded SHA-256.
pub fn verify_bundle(dir: &Path) -> Result<BundleSummary, EngineError> {
    let steps: StepsDocument = read_json(&dir.join("meta.json"), "steps")?;
    let events: EventsDocument = read_json(&dir.join("events.json"), "events")?;
    let (steps, events) = (steps.steps, events.events);

    verify_partition(&steps, events.len()).map_err(EngineError::Reconciliation)?;

    let mut snapshots = 0;
    for step in &steps {
        let observed: Vec<&str> = step
            .event_indexes
            .iter()
            .map(|&i| events[i].event_type.as_str())
            .collect();
        if !step.event_types.is_empty() && step.event_types != observed {
            return Err(EngineError::Reconciliation(format!(
                "step {} lists types {:?} but its events are {:?}",
                step.index, step.event_types, observed
            )));
        }

        if let Some(rel) = &step.snapshot_file {
            let digest = sha256_file(&dir.join(rel))?;
            if step.snapshot_sha256.as_deref().is_some_and(|want| want != digest) {
                return Err(EngineError::Reconciliation(format!(
                    "snapshot {} does not match its recorded sha256",
                    rel
                )));
            }
            snapshots += 1;
        }
    }

    Ok(BundleSummary {
        steps: steps.len(),
        events: events.len(),
        snapshots,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    what: &'static str,
) -> Result<T, EngineError> {
    let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| EngineError::Json { what, source })
}

/// Pretty JSON with a four-space indent.
fn to_json_4<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

fn sha256_file(path: &Path) -> Result<String, EngineError> {
    let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Unix seconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_timestamp(unix: i64) -> String {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    OffsetDateTime::from_unix_timestamp(unix)
        .ok()
        .and_then(|t| t.format(format).ok())
        .unwrap_or_default()
}

/// The human-readable step report.
///
/// Each step gets a header naming its tags, whether it has a snapshot and
/// the time of its last event, then one line per event.
pub fn render_steps_md(steps: &[RunStep], events: &[Event]) -> String {
    let blocks: Vec<String> = steps
        .iter()
        .map(|step| {
            let mut created = None;
            let lines: Vec<String> = step
                .event_indexes
                .iter()
                .filter_map(|&i| events.get(i).map(|e| (i, e)))
                .map(|(i, e)| {
                    created = Some(e.created);
                    format!(
                        "- {}. `{}`, `{}`, `{}`",
                        i,
                        e.event_type,
                        e.object_id().unwrap_or(""),
                        e.id
                    )
                })
                .collect();

            let mut labels = Vec::new();
            if !step.tags.is_empty() {
                labels.push(step.tags.join("-"));
            }
            if step.snapshot_file.is_some() {
                labels.push("has_dl".to_string());
            }
            let when = created.map(iso_timestamp).unwrap_or_default();

            [
                format!("--- step_id-{}, {}, {} ---", step.index, labels.join(", "), when),
                lines.join("\n"),
                "\n".to_string(),
            ]
            .join("\n")
        })
        .collect();
    blocks.join("\n")
}

/// Fast mode report: declared vs observed types per write, then one
/// `[type, created, id, object_id]` row per event.
pub fn render_discovery(steps: &[DiscoveredStep]) -> String {
    let mut out = String::new();
    for step in steps {
        let observed = event_types(&step.events);
        out.push_str(&format!("write {}\n", step.index));
        out.push_str(&format!("  declared: {:?}\n", step.declared));
        out.push_str(&format!("  observed: {:?}\n", observed));
        for e in &step.events {
            out.push_str(&format!(
                "  [{:?}, {:?}, {:?}, {:?}]\n",
                e.event_type,
                iso_timestamp(e.created),
                e.id,
                e.object_id().unwrap_or("")
            ));
        }
    }
    out
}
