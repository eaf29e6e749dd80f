//! The timeline state machine.
//!
//! A normal run executes every step strictly in sequence:
//!
//! ```text
//! Idle -> TagPending -> Executing -> Converging -> Recorded -> ...
//! ```
//!
//! Each write is preceded by a fenced snapshot and followed by a wait until
//! exactly the declared event types have appeared after the fence. At the
//! end the per-step event ids are reconciled against the provider's full
//! log, so every event in the bundle belongs to exactly one step.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eventseq_core::{Event, RunState, RunStep, Step, Timeline, WriteStep};
use eventseq_provider::EventLog;
use tokio::process::Command;
use tokio::time::{sleep, Instant};

use crate::clock::{Clock, SystemClock};
use crate::diff::write_diff_files;
use crate::error::EngineError;
use crate::fetch::{event_types, EventFetcher, Fence};
use crate::snapshot::{Snapshot, SnapshotExporter, Snapshotter};
use crate::wait::{wait_until, WaitPolicy};

static SYSTEM_CLOCK: SystemClock = SystemClock;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Minimum time between the starts of two consecutive write actions.
    ///
    /// Provider timestamps have one-second resolution; spacing writes by
    /// more than that keeps each step's events in a distinct second.
    pub min_spacing: Duration,
    /// Pause after a write before polling for its events.
    pub settle_delay: Duration,
    pub convergence: WaitPolicy,
    /// How long fast mode waits after each write before collecting events.
    pub discovery_window: Duration,
    /// Where in-flight snapshots are written before the bundle exists.
    pub scratch_dir: PathBuf,
    /// Write expected/observed type lists to temp files on a convergence timeout.
    pub write_diff_files: bool,
    /// Shell command run as `<command> <expected> <observed>` on those files.
    pub diff_command: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            min_spacing: Duration::from_millis(1100),
            settle_delay: Duration::from_millis(3000),
            convergence: WaitPolicy::default(),
            discovery_window: Duration::from_millis(3000),
            scratch_dir: std::env::temp_dir(),
            write_diff_files: true,
            diff_command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    TagPending(String),
    Executing { step: usize },
    Converging { step: usize },
    Recorded { step: usize },
}

/// A reconciled step together with its not yet persisted snapshot.
#[derive(Debug)]
pub struct RecordedStep {
    pub step: RunStep,
    pub snapshot: Option<Snapshot>,
}

/// Result of a normal run, ready for the fixture writer.
#[derive(Debug)]
pub struct RunRecord {
    pub steps: Vec<RecordedStep>,
    /// The provider's full event log, oldest-first.
    pub events: Vec<Event>,
}

/// One write step observed in fast mode.
#[derive(Debug, Clone)]
pub struct DiscoveredStep {
    pub index: usize,
    pub declared: Vec<String>,
    pub events: Vec<Event>,
}

/// A write step before reconciliation: events are known by id only.
#[derive(Debug)]
pub(crate) struct PendingStep {
    pub tags: Vec<String>,
    pub snapshot: Option<Snapshot>,
    pub event_ids: Vec<String>,
}

pub struct Runner<'a> {
    log: &'a dyn EventLog,
    exporter: Option<&'a dyn SnapshotExporter>,
    clock: &'a dyn Clock,
    options: RunOptions,
    phase: RunPhase,
    state: RunState,
}

impl<'a> Runner<'a> {
    pub fn new(log: &'a dyn EventLog, options: RunOptions) -> Self {
        Runner {
            log,
            exporter: None,
            clock: &SYSTEM_CLOCK,
            options,
            phase: RunPhase::Idle,
            state: RunState::new(),
        }
    }

    /// Take a snapshot before every write and at the end of the run.
    pub fn with_exporter(mut self, exporter: &'a dyn SnapshotExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute `timeline` and return the reconciled record.
    ///
    /// Any error aborts the run; snapshots taken so far are deleted when the
    /// partial record is dropped.
    pub async fn run(&mut self, timeline: Timeline) -> Result<RunRecord, EngineError> {
        let fetcher = EventFetcher::new(self.log);
        let mut pending_tag: Option<String> = None;
        let mut last_write: Option<Instant> = None;
        let mut steps: Vec<PendingStep> = Vec::new();

        tracing::info!(steps = timeline.len(), "running timeline");
        for (index, step) in timeline.into_iter().enumerate() {
            match step {
                Step::Tag(label) => {
                    if let Some(pending) = pending_tag.take() {
                        return Err(EngineError::DoubleTag {
                            pending,
                            next: label,
                        });
                    }
                    self.set_phase(RunPhase::TagPending(label.clone()));
                    pending_tag = Some(label);
                }
                Step::Assert(check) => {
                    check(self.state.clone())
                        .await
                        .map_err(|source| EngineError::Step {
                            index,
                            kind: "assert",
                            source,
                        })?;
                    tracing::debug!(index, "assertion passed");
                }
                Step::Write(write) => {
                    let ordinal = steps.len();
                    let snapshot = self.capture().await?;
                    let fence = match &snapshot {
                        Some(s) => s.fence(),
                        None => Fence::from_latest(fetcher.latest_event_id().await?),
                    };

                    if let Some(prev) = last_write {
                        wait_until(prev + self.options.min_spacing).await;
                    }
                    last_write = Some(Instant::now());

                    self.set_phase(RunPhase::Executing { step: ordinal });
                    self.execute(index, &write).await?;
                    sleep(self.options.settle_delay).await;

                    self.set_phase(RunPhase::Converging { step: ordinal });
                    let events = match fetcher
                        .wait_for_event_types(
                            &write.events,
                            &fence,
                            write.ensure_order,
                            self.options.convergence,
                        )
                        .await
                    {
                        Ok(events) => events,
                        Err(err) => {
                            self.report_divergence(&err).await;
                            return Err(err);
                        }
                    };

                    let tags: Vec<String> = pending_tag.take().into_iter().collect();
                    tracing::info!(
                        step = ordinal,
                        tags = %tags.join("-"),
                        events = events.len(),
                        "step converged"
                    );
                    steps.push(PendingStep {
                        tags,
                        snapshot,
                        event_ids: events.into_iter().map(|e| e.id).collect(),
                    });
                    self.set_phase(RunPhase::Recorded { step: ordinal });
                }
            }
        }

        if let Some(tag) = pending_tag {
            return Err(EngineError::DanglingTag(tag));
        }

        // end state: a snapshot with no events of its own
        let snapshot = self.capture().await?;
        steps.push(PendingStep {
            tags: Vec::new(),
            snapshot,
            event_ids: Vec::new(),
        });

        let events = fetcher.all_events().await?;
        let steps = reconcile(steps, &events)?;
        tracing::info!(steps = steps.len(), events = events.len(), "run reconciled");
        self.set_phase(RunPhase::Idle);
        Ok(RunRecord { steps, events })
    }

    /// Fast mode: run the writes only and report what each one produced.
    ///
    /// Tags, assertions, snapshots and convergence are skipped. Events are
    /// collected by creation time, so nothing here relies on the declared
    /// types being right.
    pub async fn discover(&mut self, timeline: Timeline) -> Result<Vec<DiscoveredStep>, EngineError> {
        let fetcher = EventFetcher::new(self.log);
        let mut out = Vec::new();

        for (index, step) in timeline.into_iter().enumerate() {
            let Step::Write(write) = step else {
                continue;
            };
            let ordinal = out.len();
            let since = self.clock.unix_now();

            self.set_phase(RunPhase::Executing { step: ordinal });
            self.execute(index, &write).await?;
            sleep(self.options.discovery_window).await;

            let events = fetcher.events_after(&Fence::Since(since)).await?;
            tracing::info!(
                step = ordinal,
                declared = write.events.len(),
                observed = events.len(),
                "step discovered"
            );
            out.push(DiscoveredStep {
                index: ordinal,
                declared: write.events,
                events,
            });
            self.set_phase(RunPhase::Recorded { step: ordinal });
        }

        self.set_phase(RunPhase::Idle);
        Ok(out)
    }

    async fn execute(&mut self, index: usize, write: &WriteStep) -> Result<(), EngineError> {
        let delta = (write.action)(self.state.clone())
            .await
            .map_err(|source| EngineError::Step {
                index,
                kind: "write",
                source,
            })?;
        for key in self.state.merge(delta) {
            tracing::warn!(key = %key, "state key overwritten");
        }
        Ok(())
    }

    async fn capture(&self) -> Result<Option<Snapshot>, EngineError> {
        match self.exporter {
            Some(exporter) => Snapshotter::new(self.log, exporter, &self.options.scratch_dir)
                .capture()
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    fn set_phase(&mut self, phase: RunPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    async fn report_divergence(&self, err: &EngineError) {
        let EngineError::ConvergenceTimeout {
            expected, observed, ..
        } = err
        else {
            return;
        };
        if !self.options.write_diff_files {
            return;
        }

        let (a, b) = match write_diff_files(expected, observed) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(error = %e, "could not write diff files");
                return;
            }
        };
        tracing::error!(
            expected = %a.display(),
            observed = %b.display(),
            "event types diverged"
        );
        if let Some(command) = &self.options.diff_command {
            open_diff(command, &a, &b).await;
        }
    }
}

async fn open_diff(command: &str, expected: &Path, observed: &Path) {
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} \"$1\" \"$2\"", command))
        .arg("sh")
        .arg(expected)
        .arg(observed)
        .status()
        .await;
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => tracing::warn!(command, status = %s, "diff command failed"),
        Err(e) => tracing::warn!(command, error = %e, "diff command failed to start"),
    }
}

/// Map each step's event ids onto positions in the full log.
///
/// The steps must cover the log exactly, front to back.
pub(crate) fn reconcile(
    steps: Vec<PendingStep>,
    events: &[Event],
) -> Result<Vec<RecordedStep>, EngineError> {
    let total: usize = steps.iter().map(|s| s.event_ids.len()).sum();
    if total != events.len() {
        return Err(EngineError::Reconciliation(format!(
            "steps observed {} events but the provider log has {}",
            total,
            events.len()
        )));
    }

    let mut position = 0;
    let mut out = Vec::with_capacity(steps.len());
    for (index, pending) in steps.into_iter().enumerate() {
        let mut event_indexes = Vec::with_capacity(pending.event_ids.len());
        for id in &pending.event_ids {
            let at = &events[position];
            if &at.id != id {
                return Err(EngineError::Reconciliation(format!(
                    "step {} observed event {} but position {} of the log is {}",
                    index, id, position, at.id
                )));
            }
            event_indexes.push(position);
            position += 1;
        }
        let slice = &events[position - event_indexes.len()..position];
        out.push(RecordedStep {
            step: RunStep {
                index,
                snapshot_file: None,
                snapshot_sha256: None,
                tags: pending.tags,
                event_indexes,
                event_types: event_types(slice),
            },
            snapshot: pending.snapshot,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(ids: &[(&str, &str)]) -> Vec<Event> {
        ids.iter()
            .enumerate()
            .map(|(i, (id, ty))| Event::new(*id, *ty, i as i64, json!({"id": "cus_1"})))
            .collect()
    }

    fn pending(tags: &[&str], ids: &[&str]) -> PendingStep {
        PendingStep {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            snapshot: None,
            event_ids: ids.iter().map(|i| i.to_string()).collect(),
        }
    }

    #[test]
    fn reconcile_assigns_positions() {
        let events = log(&[
            ("evt_1", "customer.created"),
            ("evt_2", "customer.updated"),
            ("evt_3", "customer.updated"),
        ]);
        let steps = vec![
            pending(&["c"], &["evt_1"]),
            pending(&["u"], &["evt_2", "evt_3"]),
            pending(&[], &[]),
        ];

        let out = reconcile(steps, &events).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].step.event_indexes, vec![0]);
        assert_eq!(out[0].step.tags, vec!["c"]);
        assert_eq!(out[1].step.index, 1);
        assert_eq!(out[1].step.event_indexes, vec![1, 2]);
        assert_eq!(
            out[1].step.event_types,
            vec!["customer.updated", "customer.updated"]
        );
        assert!(out[2].step.event_indexes.is_empty());
    }

    #[test]
    fn reconcile_rejects_unclaimed_events() {
        let events = log(&[("evt_1", "a"), ("evt_2", "b")]);
        let err = reconcile(vec![pending(&[], &["evt_1"])], &events).unwrap_err();
        assert!(matches!(err, EngineError::Reconciliation(ref m) if m.contains("1 events but the provider log has 2")));
    }

    #[test]
    fn reconcile_rejects_reordered_ids() {
        let events = log(&[("evt_1", "a"), ("evt_2", "b")]);
        let steps = vec![pending(&[], &["evt_2"]), pending(&[], &["evt_1"])];
        let err = reconcile(steps, &events).unwrap_err();
        assert!(err.to_string().contains("step 0 observed event evt_2"));
    }

    #[test]
    fn default_timings() {
        let options = RunOptions::default();
        assert_eq!(options.min_spacing, Duration::from_millis(1100));
        assert_eq!(options.settle_delay, Duration::from_secs(3));
        assert_eq!(options.convergence.interval, Duration::from_millis(500));
        assert_eq!(options.convergence.timeout, Duration::from_secs(10));
    }
}
