use async_trait::async_trait;
use eventseq_core::Event;

use crate::error::ProviderError;
use crate::pagination::Page;

pub type EventPage = Page<Event>;

/// Query parameters for the provider's events list endpoint.
///
/// The provider always returns newest-first. `starting_after` moves towards
/// older events, `ending_before` towards newer ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub limit: u32,
    pub starting_after: Option<String>,
    pub ending_before: Option<String>,
    /// Only events with `created >= created_gte` (unix seconds).
    pub created_gte: Option<i64>,
}

impl EventQuery {
    /// Maximum page size the provider accepts.
    pub const MAX_LIMIT: u32 = 100;

    pub fn newest(limit: u32) -> Self {
        EventQuery {
            limit,
            starting_after: None,
            ending_before: None,
            created_gte: None,
        }
    }

    pub fn starting_after(mut self, id: Option<String>) -> Self {
        self.starting_after = id;
        self
    }

    pub fn ending_before(mut self, id: Option<String>) -> Self {
        self.ending_before = id;
        self
    }

    pub fn created_gte(mut self, ts: i64) -> Self {
        self.created_gte = Some(ts);
        self
    }
}

impl Default for EventQuery {
    fn default() -> Self {
        EventQuery::newest(EventQuery::MAX_LIMIT)
    }
}

/// The provider's append-only event log.
///
/// The harness only ever reads it. Implementations must be `Send + Sync`
/// so the runner can hold them across await points.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_cursors() {
        let q = EventQuery::newest(1)
            .starting_after(Some("evt_9".into()))
            .created_gte(1_600_000_000);
        assert_eq!(q.limit, 1);
        assert_eq!(q.starting_after.as_deref(), Some("evt_9"));
        assert_eq!(q.ending_before, None);
        assert_eq!(q.created_gte, Some(1_600_000_000));
    }

    #[test]
    fn default_uses_max_page() {
        assert_eq!(EventQuery::default().limit, 100);
    }
}
