//! The log lists newest-first and `limit` caps the page.

use eventseq_provider::EventQuery;

use crate::traits::TestableEventLog;

pub async fn check_newest_first<L: TestableEventLog>(log: &L) -> Result<(), String> {
    let mut emitted = Vec::new();
    for t in ["a.created", "a.updated", "a.deleted"] {
        emitted.push(log.emit_visible(t).await.id);
    }

    let page = log
        .list_events(&EventQuery::default())
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    let listed: Vec<String> = page.data.iter().map(|e| e.id.clone()).collect();
    emitted.reverse();
    if listed != emitted {
        return Err(format!("expected {:?} newest-first, got {:?}", emitted, listed));
    }
    if page.has_more {
        return Err("has_more set on a complete page".to_string());
    }

    let one = log
        .list_events(&EventQuery::newest(1))
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    if one.data.len() != 1 || one.data[0].id != emitted[0] || !one.has_more {
        return Err(format!(
            "limit 1 should return only {} with has_more, got {:?} (has_more={})",
            emitted[0],
            one.data.iter().map(|e| &e.id).collect::<Vec<_>>(),
            one.has_more
        ));
    }
    Ok(())
}
