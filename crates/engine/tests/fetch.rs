//! Event fetcher behaviour: fences, paging and convergence.

use std::time::Duration;

use eventseq_engine::{EngineError, EventFetcher, Fence, WaitPolicy};
use eventseq_testkit::InMemoryProvider;
use serde_json::json;

fn types(events: &[eventseq_core::Event]) -> Vec<&str> {
    events.iter().map(|e| e.event_type.as_str()).collect()
}

fn s(items: &[&str]) -> Vec<String> {
    items.iter().map(|x| x.to_string()).collect()
}

// ──────────────────────────────────────────────
// Fences
// ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn after_fence_excludes_older_events() {
    let provider = InMemoryProvider::new();
    provider.emit("customer.created", json!({"id": "cus_1"}));
    let fetcher = EventFetcher::new(&provider);

    let fence = Fence::from_latest(fetcher.latest_event_id().await.unwrap());
    assert_eq!(fence, Fence::After("evt_000001".into()));
    provider.emit("customer.updated", json!({"id": "cus_1"}));
    provider.emit("customer.deleted", json!({"id": "cus_1"}));

    let events = fetcher.events_after(&fence).await.unwrap();
    assert_eq!(types(&events), ["customer.updated", "customer.deleted"]);
}

#[tokio::test(start_paused = true)]
async fn start_fence_on_empty_log_sees_everything() {
    let provider = InMemoryProvider::new();
    let fetcher = EventFetcher::new(&provider);
    let fence = Fence::from_latest(fetcher.latest_event_id().await.unwrap());
    assert_eq!(fence, Fence::Start);

    provider.emit_all(&["a", "b"], json!({"id": "x"}));
    let events = fetcher.events_after(&fence).await.unwrap();
    assert_eq!(types(&events), ["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn after_fence_pages_past_one_page() {
    let provider = InMemoryProvider::new();
    provider.emit("before", json!({"id": "x"}));
    let fetcher = EventFetcher::new(&provider);
    let fence = Fence::from_latest(fetcher.latest_event_id().await.unwrap());

    for i in 0..250 {
        provider.emit(&format!("t{}", i), json!({"id": "x"}));
    }
    let events = fetcher.events_after(&fence).await.unwrap();
    assert_eq!(events.len(), 250);
    assert_eq!(events[0].event_type, "t0");
    assert_eq!(events[249].event_type, "t249");
    assert!(events.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test(start_paused = true)]
async fn since_fence_uses_creation_time() {
    let provider = InMemoryProvider::new();
    provider.emit("old", json!({"id": "x"}));
    tokio::time::sleep(Duration::from_secs(2)).await;
    let since = eventseq_engine::Clock::unix_now(&provider);
    provider.emit("new", json!({"id": "x"}));

    let fetcher = EventFetcher::new(&provider);
    let events = fetcher.events_after(&Fence::Since(since)).await.unwrap();
    assert_eq!(types(&events), ["new"]);
}

#[tokio::test(start_paused = true)]
async fn all_events_is_oldest_first_across_pages() {
    let provider = InMemoryProvider::new();
    for i in 0..120 {
        provider.emit(&format!("t{}", i), json!({"id": "x"}));
    }
    let events = EventFetcher::new(&provider).all_events().await.unwrap();
    assert_eq!(events.len(), 120);
    assert_eq!(events[0].id, "evt_000001");
    assert_eq!(events[119].id, "evt_000120");
    assert_eq!(provider.list_calls(), 2);
}

// ──────────────────────────────────────────────
// Convergence
// ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn waits_out_publication_lag() {
    let provider = InMemoryProvider::with_lag(Duration::from_millis(1800));
    let fetcher = EventFetcher::new(&provider);
    provider.emit("customer.created", json!({"id": "cus_1"}));

    let start = tokio::time::Instant::now();
    let events = fetcher
        .wait_for_event_types(&s(&["customer.created"]), &Fence::Start, true, WaitPolicy::default())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn ordered_wait_rejects_reordered_events() {
    let provider = InMemoryProvider::new();
    provider.emit_all(&["b", "a"], json!({"id": "x"}));

    let err = EventFetcher::new(&provider)
        .wait_for_event_types(&s(&["a", "b"]), &Fence::Start, true, WaitPolicy::default())
        .await
        .unwrap_err();
    match err {
        EngineError::ConvergenceTimeout {
            expected,
            observed,
            ensure_order,
            ..
        } => {
            assert_eq!(expected, ["a", "b"]);
            assert_eq!(observed, ["b", "a"]);
            assert!(ensure_order);
        }
        other => panic!("expected convergence timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn unordered_wait_accepts_any_permutation() {
    let provider = InMemoryProvider::new();
    provider.emit_all(&["b", "a", "b"], json!({"id": "x"}));

    let events = EventFetcher::new(&provider)
        .wait_for_event_types(&s(&["a", "b", "b"]), &Fence::Start, false, WaitPolicy::default())
        .await
        .unwrap();
    assert_eq!(types(&events), ["b", "a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn superset_never_converges() {
    let provider = InMemoryProvider::new();
    provider.emit_all(&["a", "b"], json!({"id": "x"}));

    let policy = WaitPolicy::new(Duration::from_millis(500), Duration::from_secs(3));
    let err = EventFetcher::new(&provider)
        .wait_for_event_types(&s(&["a"]), &Fence::Start, false, policy)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("timed out after 3000ms"), "{}", msg);
    assert!(msg.contains("+ b"), "{}", msg);
}
