//! Persisted fixture records: `meta.json` and `events.json`.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// One recorded write step (or the trailing end-state snapshot).
///
/// `event_indexes` point into the bundle's full event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStep {
    pub index: usize,
    /// Path of the pre-step snapshot, relative to the bundle directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<String>,
    /// Hex SHA-256 of the snapshot file contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_sha256: Option<String>,
    pub tags: Vec<String>,
    pub event_indexes: Vec<usize>,
    #[serde(default)]
    pub event_types: Vec<String>,
}

/// Top-level shape of `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepsDocument {
    pub steps: Vec<RunStep>,
}

/// Top-level shape of `events.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsDocument {
    pub events: Vec<Event>,
}

/// Check that the steps' event indexes partition `0..event_count` in order.
///
/// Every event must belong to exactly one step and the steps must cover the
/// log front to back without gaps.
pub fn verify_partition(steps: &[RunStep], event_count: usize) -> Result<(), String> {
    let total: usize = steps.iter().map(|s| s.event_indexes.len()).sum();
    if total != event_count {
        return Err(format!(
            "steps reference {} events but the log has {}",
            total, event_count
        ));
    }

    let mut next = 0;
    for step in steps {
        if step.event_types.len() != step.event_indexes.len() && !step.event_types.is_empty() {
            return Err(format!(
                "step {} has {} event indexes but {} event types",
                step.index,
                step.event_indexes.len(),
                step.event_types.len()
            ));
        }
        for &i in &step.event_indexes {
            if i != next {
                return Err(format!(
                    "step {} references event {} where {} was expected",
                    step.index, i, next
                ));
            }
            next += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, events: &[usize]) -> RunStep {
        RunStep {
            index,
            snapshot_file: None,
            snapshot_sha256: None,
            tags: vec![],
            event_indexes: events.to_vec(),
            event_types: vec![],
        }
    }

    #[test]
    fn contiguous_partition_is_valid() {
        let steps = vec![step(0, &[0]), step(1, &[1, 2]), step(2, &[])];
        assert!(verify_partition(&steps, 3).is_ok());
    }

    #[test]
    fn missing_event_is_rejected() {
        let steps = vec![step(0, &[0]), step(1, &[1])];
        let err = verify_partition(&steps, 3).unwrap_err();
        assert!(err.contains("2 events but the log has 3"));
    }

    #[test]
    fn double_counted_event_is_rejected() {
        let steps = vec![step(0, &[0, 1]), step(1, &[1])];
        let err = verify_partition(&steps, 3).unwrap_err();
        assert!(err.contains("step 1 references event 1 where 2 was expected"));
    }

    #[test]
    fn snapshot_fields_are_omitted_when_absent() {
        let json = serde_json::to_value(step(0, &[0])).unwrap();
        assert!(json.get("snapshot_file").is_none());
        assert!(json.get("snapshot_sha256").is_none());
        assert_eq!(json["event_indexes"], serde_json::json!([0]));
    }
}
