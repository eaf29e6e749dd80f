use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventseq_engine::{EngineError, SnapshotExporter};
use serde_json::json;

use crate::provider::InMemoryProvider;

/// Writes the provider's current event ids to the snapshot file.
///
/// Optionally emits an event mid-export to simulate another writer racing
/// the download.
pub struct FakeExporter {
    provider: Arc<InMemoryProvider>,
    exports: AtomicUsize,
    duration: Duration,
    intrude: Mutex<Option<String>>,
}

impl FakeExporter {
    pub fn new(provider: Arc<InMemoryProvider>) -> Self {
        FakeExporter {
            provider,
            exports: AtomicUsize::new(0),
            duration: Duration::ZERO,
            intrude: Mutex::new(None),
        }
    }

    /// Make every export take `duration` of (tokio) time.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Emit an event of `event_type` while the next export runs.
    pub fn emit_during_next_export(&self, event_type: &str) {
        if let Ok(mut slot) = self.intrude.lock() {
            *slot = Some(event_type.to_string());
        }
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotExporter for FakeExporter {
    async fn export(&self, dest: &Path) -> Result<(), EngineError> {
        let n = self.exports.fetch_add(1, Ordering::SeqCst);
        let intruder = self.intrude.lock().ok().and_then(|mut slot| slot.take());

        if let Some(event_type) = intruder {
            self.provider.emit(&event_type, json!({ "id": "obj_intruder" }));
            tokio::time::sleep(self.provider.lag()).await;
        }
        tokio::time::sleep(self.duration).await;

        let ids: Vec<String> = self.provider.events().into_iter().map(|e| e.id).collect();
        let body = json!({ "export": n, "event_ids": ids });
        std::fs::write(dest, body.to_string()).map_err(|e| EngineError::Export(e.to_string()))
    }
}
