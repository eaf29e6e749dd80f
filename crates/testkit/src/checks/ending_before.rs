//! `ending_before` returns the newer events adjacent to the cursor.

use eventseq_provider::EventQuery;

use crate::traits::TestableEventLog;

pub async fn check_ending_before<L: TestableEventLog>(log: &L) -> Result<(), String> {
    let mut emitted = Vec::new();
    for i in 0..4 {
        emitted.push(log.emit_visible(&format!("t{}", i)).await.id);
    }

    let query = EventQuery::newest(2).ending_before(Some(emitted[0].clone()));
    let page = log
        .list_events(&query)
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    let ids: Vec<&str> = page.data.iter().map(|e| e.id.as_str()).collect();
    let expected = vec![emitted[2].as_str(), emitted[1].as_str()];
    if ids != expected || !page.has_more {
        return Err(format!(
            "expected {:?} with has_more, got {:?} (has_more={})",
            expected, ids, page.has_more
        ));
    }

    let newest = EventQuery::default().ending_before(Some(emitted[3].clone()));
    let empty = log
        .list_events(&newest)
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    if !empty.data.is_empty() || empty.has_more {
        return Err("nothing is newer than the newest event".to_string());
    }
    Ok(())
}
