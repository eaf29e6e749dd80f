//! Sample timelines driving an [`InMemoryProvider`].
//!
//! Actions emit events directly into the fake log the way a provider call
//! would produce them server-side.

use std::sync::Arc;

use eventseq_core::{ensure_eq, RunState, StateDelta, Step, StepError, Timeline};
use serde_json::json;

use crate::provider::InMemoryProvider;

/// A write step whose action emits `types` against one object.
pub fn emitting(
    provider: &Arc<InMemoryProvider>,
    types: &[&str],
    object_id: &str,
    state_key: Option<&str>,
) -> Step {
    let p = Arc::clone(provider);
    let emit: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    let object_id = object_id.to_string();
    let state_key = state_key.map(str::to_string);
    Step::write(types.to_vec(), move |_state: RunState| {
        let p = Arc::clone(&p);
        let emit = emit.clone();
        let object_id = object_id.clone();
        let state_key = state_key.clone();
        async move {
            for t in &emit {
                p.emit(t, json!({ "id": object_id, "object": "customer" }));
            }
            Ok(match state_key {
                Some(key) => StateDelta::new().with(key, object_id),
                None => StateDelta::new(),
            })
        }
    })
}

/// Tag `c` creates a customer, tag `u` updates it; an assertion between the
/// two checks the created id reached the run state.
pub fn create_update(provider: &Arc<InMemoryProvider>) -> Timeline {
    vec![
        Step::tag("c"),
        emitting(provider, &["customer.created"], "cus_1", Some("c1")),
        Step::assert(|state: RunState| async move {
            ensure_eq(&state.get("c1")?, &"cus_1", "created customer id")
        }),
        Step::tag("u"),
        Step::write(["customer.updated"], {
            let p = Arc::clone(provider);
            move |state: RunState| {
                let p = Arc::clone(&p);
                async move {
                    let id = state.get("c1")?.to_string();
                    p.emit("customer.updated", json!({ "id": id, "object": "customer" }));
                    Ok(StateDelta::new())
                }
            }
        }),
    ]
}

/// A write whose declared events never all arrive.
pub fn under_delivering(provider: &Arc<InMemoryProvider>) -> Timeline {
    let p = Arc::clone(provider);
    vec![Step::write(
        ["customer.created", "customer.updated"],
        move |_state: RunState| {
            let p = Arc::clone(&p);
            async move {
                p.emit("customer.created", json!({ "id": "cus_1" }));
                Ok::<_, StepError>(StateDelta::new())
            }
        },
    )]
}
