//! An in-memory event log with Stripe list semantics.
//!
//! Events are listed newest-first. Each event becomes visible `lag` after
//! it is emitted, and `created` advances with tokio time, so tests that run
//! with a paused clock see the same timing behaviour as a live account.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use eventseq_core::Event;
use eventseq_engine::Clock;
use eventseq_provider::{EventLog, EventPage, EventQuery, ProviderError};
use serde_json::{json, Value};
use tokio::time::Instant;

/// Unix time the fake account's clock starts at.
pub const BASE_UNIX: i64 = 1_600_000_000;

struct Stored {
    event: Event,
    visible_at: Instant,
}

#[derive(Default)]
struct Inner {
    events: Vec<Stored>,
    next_id: u64,
    list_calls: usize,
}

pub struct InMemoryProvider {
    inner: Mutex<Inner>,
    lag: Duration,
    epoch: Instant,
}

impl InMemoryProvider {
    /// A provider whose events are listable immediately.
    pub fn new() -> Self {
        Self::with_lag(Duration::ZERO)
    }

    pub fn with_lag(lag: Duration) -> Self {
        InMemoryProvider {
            inner: Mutex::new(Inner::default()),
            lag,
            epoch: Instant::now(),
        }
    }

    pub fn lag(&self) -> Duration {
        self.lag
    }

    /// Append an event. It is listable once `lag` has passed.
    pub fn emit(&self, event_type: &str, object: Value) -> Event {
        let created = self.unix_now();
        let mut inner = self.lock();
        inner.next_id += 1;
        let event = Event::new(format!("evt_{:06}", inner.next_id), event_type, created, object);
        inner.events.push(Stored {
            event: event.clone(),
            visible_at: Instant::now() + self.lag,
        });
        event
    }

    pub fn emit_all(&self, event_types: &[&str], object: Value) -> Vec<Event> {
        event_types
            .iter()
            .map(|t| self.emit(t, object.clone()))
            .collect()
    }

    /// Every emitted event, visible or not, oldest-first.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.iter().map(|s| s.event.clone()).collect()
    }

    /// Number of `list_events` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Drop every event, as a "delete all test data" would.
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn page(&self, query: &EventQuery) -> Result<EventPage, ProviderError> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.list_calls += 1;

        let newest_first: Vec<&Event> = inner
            .events
            .iter()
            .rev()
            .filter(|s| s.visible_at <= now)
            .map(|s| &s.event)
            .collect();

        let position = |id: &str| {
            newest_first
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| ProviderError::Api {
                    method: "GET",
                    path: "/v1/events".to_string(),
                    status: 404,
                    code: Some("resource_missing".to_string()),
                    message: format!("No such event: '{}'", id),
                })
        };

        let window: &[&Event] = match (&query.starting_after, &query.ending_before) {
            (Some(id), _) => &newest_first[position(id)? + 1..],
            (None, Some(id)) => &newest_first[..position(id)?],
            (None, None) => &newest_first,
        };
        let matching: Vec<&Event> = window
            .iter()
            .copied()
            .filter(|e| query.created_gte.map_or(true, |ts| e.created >= ts))
            .collect();

        let limit = query.limit.max(1) as usize;
        let has_more = matching.len() > limit;
        let data: Vec<Event> = if query.ending_before.is_some() && query.starting_after.is_none() {
            // the page adjacent to the cursor: its oldest `limit` newer events
            matching[matching.len().saturating_sub(limit)..]
                .iter()
                .map(|e| (*e).clone())
                .collect()
        } else {
            matching.iter().take(limit).map(|e| (*e).clone()).collect()
        };
        Ok(EventPage { data, has_more })
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryProvider {
    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, ProviderError> {
        self.page(query)
    }
}

impl Clock for InMemoryProvider {
    fn unix_now(&self) -> i64 {
        BASE_UNIX + self.epoch.elapsed().as_secs() as i64
    }
}

#[async_trait]
impl crate::traits::TestableEventLog for InMemoryProvider {
    async fn emit_visible(&self, event_type: &str) -> Event {
        let event = self.emit(event_type, json!({ "id": "obj_check" }));
        tokio::time::sleep(self.lag).await;
        event
    }
}
