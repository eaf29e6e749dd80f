//! Reads of the provider event log.
//!
//! The provider lists newest-first; everything returned from here is
//! oldest-first (creation order) and de-duplicated by event id.

use std::collections::HashSet;

use eventseq_core::Event;
use eventseq_provider::{EventLog, EventQuery, Paginator, ProviderError};

use crate::diff::render_type_diff;
use crate::error::EngineError;
use crate::wait::{wait_for, Probe, WaitError, WaitPolicy};

/// A reference point for "events after here" queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fence {
    /// The log was empty when the fence was taken: every event is after it.
    Start,
    /// Events strictly newer than this event id.
    After(String),
    /// Events with `created >=` this unix timestamp.
    Since(i64),
}

impl Fence {
    /// Fence on the result of [`EventFetcher::latest_event_id`].
    pub fn from_latest(latest: Option<String>) -> Self {
        match latest {
            Some(id) => Fence::After(id),
            None => Fence::Start,
        }
    }
}

/// Compare observed event types against a step's expectation.
///
/// Ordered: exact sequence equality. Unordered: equal as multisets.
pub fn types_match(expected: &[String], observed: &[String], ensure_order: bool) -> bool {
    if ensure_order {
        return expected == observed;
    }
    let mut a = expected.to_vec();
    let mut b = observed.to_vec();
    a.sort();
    b.sort();
    a == b
}

pub struct EventFetcher<'a> {
    log: &'a dyn EventLog,
}

impl<'a> EventFetcher<'a> {
    pub fn new(log: &'a dyn EventLog) -> Self {
        EventFetcher { log }
    }

    /// Id of the most recent event, `None` if the log is empty.
    pub async fn latest_event_id(&self) -> Result<Option<String>, ProviderError> {
        let page = self.log.list_events(&EventQuery::newest(1)).await?;
        Ok(page.data.into_iter().next().map(|e| e.id))
    }

    /// The entire log, oldest-first.
    pub async fn all_events(&self) -> Result<Vec<Event>, ProviderError> {
        self.newest_first(EventQuery::default())
            .await
            .map(oldest_first)
    }

    /// Events after `fence`, oldest-first.
    pub async fn events_after(&self, fence: &Fence) -> Result<Vec<Event>, ProviderError> {
        match fence {
            Fence::Start => self.all_events().await,
            Fence::Since(ts) => self
                .newest_first(EventQuery::default().created_gte(*ts))
                .await
                .map(oldest_first),
            Fence::After(id) => self.newer_than(id).await,
        }
    }

    /// Poll [`events_after`](Self::events_after) until the observed types
    /// equal `expected`.
    ///
    /// A superset never matches: extra events mean the timeline's
    /// expectation is wrong, and waiting longer cannot fix that.
    pub async fn wait_for_event_types(
        &self,
        expected: &[String],
        fence: &Fence,
        ensure_order: bool,
        policy: WaitPolicy,
    ) -> Result<Vec<Event>, EngineError> {
        let fetcher = self;
        let result = wait_for(policy, move || async move {
            let events = fetcher.events_after(fence).await?;
            let observed = event_types(&events);
            if types_match(expected, &observed, ensure_order) {
                Ok::<_, ProviderError>(Probe::Ready(events))
            } else {
                tracing::debug!(
                    expected = expected.len(),
                    observed = observed.len(),
                    "events not converged yet"
                );
                Ok::<_, ProviderError>(Probe::Pending(events))
            }
        })
        .await;

        match result {
            Ok(events) => Ok(events),
            Err(WaitError::Probe(e)) => Err(e.into()),
            Err(WaitError::TimedOut { last, elapsed }) => {
                let observed = last.as_deref().map(event_types).unwrap_or_default();
                let diff = if ensure_order {
                    render_type_diff(expected, &observed)
                } else {
                    let mut a = expected.to_vec();
                    let mut b = observed.clone();
                    a.sort();
                    b.sort();
                    render_type_diff(&a, &b)
                };
                Err(EngineError::ConvergenceTimeout {
                    expected: expected.to_vec(),
                    observed,
                    ensure_order,
                    waited_ms: elapsed.as_millis(),
                    diff,
                })
            }
        }
    }

    async fn newest_first(&self, base: EventQuery) -> Result<Vec<Event>, ProviderError> {
        let log = self.log;
        Paginator::new(move |cursor: Option<String>| {
            let query = base.clone().starting_after(cursor);
            async move { log.list_events(&query).await }
        })
        .collect_all()
        .await
    }

    /// Walk forward from `id` with `ending_before`, one page at a time.
    async fn newer_than(&self, id: &str) -> Result<Vec<Event>, ProviderError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut cursor = id.to_string();
        loop {
            let query = EventQuery::default().ending_before(Some(cursor.clone()));
            let page = self.log.list_events(&query).await?;
            let newest = page.data.first().map(|e| e.id.clone());
            for event in page.data.into_iter().rev() {
                if seen.insert(event.id.clone()) {
                    out.push(event);
                }
            }
            match newest {
                Some(next) if page.has_more => cursor = next,
                _ => return Ok(out),
            }
        }
    }
}

pub fn event_types(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.event_type.clone()).collect()
}

fn oldest_first(newest_first: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut out: Vec<Event> = newest_first
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect();
    out.reverse();
    out
}
