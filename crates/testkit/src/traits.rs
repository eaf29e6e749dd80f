use async_trait::async_trait;
use eventseq_core::Event;
use eventseq_provider::EventLog;

/// An event log the list-endpoint checks can write to.
#[async_trait]
pub trait TestableEventLog: EventLog {
    /// Append an event of `event_type` and return it once it is listable.
    async fn emit_visible(&self, event_type: &str) -> Event;
}
