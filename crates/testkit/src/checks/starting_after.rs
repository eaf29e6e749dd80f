//! `starting_after` walks towards older events without gaps or repeats.

use eventseq_provider::{EventQuery, Paginator};

use crate::traits::TestableEventLog;

pub async fn check_starting_after<L: TestableEventLog>(log: &L) -> Result<(), String> {
    let mut emitted = Vec::new();
    for i in 0..5 {
        emitted.push(log.emit_visible(&format!("t{}", i)).await.id);
    }

    let all = Paginator::new(|cursor: Option<String>| {
        let query = EventQuery::newest(2).starting_after(cursor);
        async move { log.list_events(&query).await }
    })
    .collect_all()
    .await
    .map_err(|e| format!("paging failed: {}", e))?;

    let mut ids: Vec<String> = all.into_iter().map(|e| e.id).collect();
    ids.reverse();
    if ids != emitted {
        return Err(format!("paged {:?}, emitted {:?}", ids, emitted));
    }
    Ok(())
}
