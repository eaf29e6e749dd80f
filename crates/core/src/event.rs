use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A provider event, as returned by the events list endpoint.
///
/// Only the fields the harness reads are typed. Everything else the provider
/// sends is kept in `rest` so that `events.json` holds the full payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix timestamp, second granularity.
    pub created: i64,
    pub data: EventData,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// The `data` envelope of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// The affected entity after the change.
    pub object: Value,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Event {
    /// Build an event with an empty payload besides `data.object`.
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        created: i64,
        object: Value,
    ) -> Self {
        Event {
            id: id.into(),
            event_type: event_type.into(),
            created,
            data: EventData {
                object,
                rest: Map::new(),
            },
            rest: Map::new(),
        }
    }

    /// The `id` of the affected entity, if it has one.
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_untyped_provider_fields() {
        let raw = json!({
            "id": "evt_1",
            "object": "event",
            "api_version": "2020-08-27",
            "created": 1614556800,
            "data": {
                "object": { "id": "cus_1", "object": "customer" },
                "previous_attributes": { "name": "old" }
            },
            "livemode": false,
            "pending_webhooks": 0,
            "type": "customer.updated"
        });

        let event: Event = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.event_type, "customer.updated");
        assert_eq!(event.object_id(), Some("cus_1"));
        assert_eq!(event.rest["api_version"], "2020-08-27");
        assert!(event.data.rest.contains_key("previous_attributes"));

        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn object_without_id() {
        let event = Event::new("evt_2", "balance.available", 0, json!({"object": "balance"}));
        assert_eq!(event.object_id(), None);
    }
}
