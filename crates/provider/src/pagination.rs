//! Cursor pagination over provider list endpoints.

use std::future::Future;
use std::marker::PhantomData;

use eventseq_core::Event;
use serde::Deserialize;

/// One page of a provider list response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

/// Items that can serve as a pagination cursor.
pub trait Listed {
    fn list_id(&self) -> Option<&str>;
}

impl Listed for Event {
    fn list_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// Walks a list endpoint page by page.
///
/// `fetch` is called with the `starting_after` cursor (`None` for the first
/// page) and decides the page size itself. Iteration stops when a page
/// reports `has_more: false` or comes back empty. Build a new paginator to
/// start over.
pub struct Paginator<T, F> {
    fetch: F,
    cursor: Option<String>,
    done: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T, E, F, Fut> Paginator<T, F>
where
    T: Listed,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    pub fn new(fetch: F) -> Self {
        Paginator {
            fetch,
            cursor: None,
            done: false,
            _item: PhantomData,
        }
    }

    /// Fetch the next page, or `None` once the list is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, E> {
        if self.done {
            return Ok(None);
        }

        let page = (self.fetch)(self.cursor.take()).await?;
        match page.data.last().and_then(Listed::list_id) {
            Some(last) if page.has_more => self.cursor = Some(last.to_string()),
            _ => self.done = true,
        }
        Ok(Some(page.data))
    }

    /// Drain every remaining page, in provider order.
    pub async fn collect_all(mut self) -> Result<Vec<T>, E> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn items(ids: &[&str]) -> Vec<Event> {
        ids.iter()
            .map(|id| Event::new(*id, "customer.updated", 0, json!({ "id": "cus_1" })))
            .collect()
    }

    #[tokio::test]
    async fn follows_cursor_until_has_more_is_false() {
        let calls = RefCell::new(Vec::new());
        let pager = Paginator::new(|cursor: Option<String>| {
            calls.borrow_mut().push(cursor.clone());
            let page = match cursor.as_deref() {
                None => Page { data: items(&["e5", "e4"]), has_more: true },
                Some("e4") => Page { data: items(&["e3", "e2"]), has_more: true },
                Some("e2") => Page { data: items(&["e1"]), has_more: false },
                Some(other) => panic!("unexpected cursor {}", other),
            };
            async move { Ok::<_, String>(page) }
        });

        let all = pager.collect_all().await.unwrap();
        let ids: Vec<_> = all.iter().filter_map(Listed::list_id).collect();
        assert_eq!(ids, ["e5", "e4", "e3", "e2", "e1"]);
        assert_eq!(
            *calls.borrow(),
            vec![None, Some("e4".to_string()), Some("e2".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_first_page_ends_iteration() {
        let mut pager = Paginator::new(|_cursor: Option<String>| async {
            Ok::<_, String>(Page::<Event> { data: vec![], has_more: true })
        });

        assert_eq!(pager.next_page().await.unwrap(), Some(vec![]));
        assert_eq!(pager.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_error_is_returned() {
        let pager = Paginator::new(|_cursor: Option<String>| async {
            Err::<Page<Event>, _>("rate limited".to_string())
        });
        assert_eq!(pager.collect_all().await.unwrap_err(), "rate limited");
    }
}
