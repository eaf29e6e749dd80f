//! `created[gte]` keeps events created at or after the timestamp.

use eventseq_provider::EventQuery;

use crate::traits::TestableEventLog;

pub async fn check_created_filter<L: TestableEventLog>(log: &L) -> Result<(), String> {
    let old = log.emit_visible("old").await;
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    let new = log.emit_visible("new").await;
    if new.created <= old.created {
        return Err(format!(
            "created did not advance: {} then {}",
            old.created, new.created
        ));
    }

    let page = log
        .list_events(&EventQuery::default().created_gte(new.created))
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    let ids: Vec<&str> = page.data.iter().map(|e| e.id.as_str()).collect();
    if ids != [new.id.as_str()] {
        return Err(format!("expected only {}, got {:?}", new.id, ids));
    }
    Ok(())
}
