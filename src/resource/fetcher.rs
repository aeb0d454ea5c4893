//! Resource Fetcher
//!
//! Drives paginated AWS list/describe calls. A page fetcher is any closure
//! taking the previous continuation token and returning one [`Page`].

use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// One page of a paginated response
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    /// A page with no continuation token
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily fetch pages until a response omits the continuation token.
///
/// An empty-string token is treated as absent. After an error the stream ends.
pub fn pages<T, E, F, Fut>(fetch: F) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream::unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return None,
        };

        match fetch(token).await {
            Ok(page) => {
                let next = match page.next_token {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Done,
                };
                Some((Ok(page.items), (fetch, next)))
            }
            Err(err) => Some((Err(err), (fetch, Cursor::Done))),
        }
    })
}

/// Fetch all items (auto-paginate), preserving page order
pub async fn collect_all<T, E, F, Fut>(fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    pages(fetch).try_concat().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::cell::RefCell;

    /// Serve `items` in pages of `size`, tokens are the start offset
    fn paged(items: &[u32], size: usize, token: Option<String>) -> Result<Page<u32>, String> {
        let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Ok(Page::new(items[start..end].to_vec(), next))
    }

    #[tokio::test]
    async fn test_collect_all_concatenates_pages_in_order() {
        let items: Vec<u32> = (0..23).collect();
        let calls = RefCell::new(0);

        let all = collect_all(|token| {
            *calls.borrow_mut() += 1;
            let page = paged(&items, 10, token);
            async move { page }
        })
        .await
        .unwrap();

        assert_eq!(all, items);
        assert_eq!(*calls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_empty_first_page_returns_empty() {
        let calls = RefCell::new(0);

        let all: Vec<u32> = collect_all(|_token| {
            *calls.borrow_mut() += 1;
            async { Ok::<_, String>(Page::last(Vec::new())) }
        })
        .await
        .unwrap();

        assert!(all.is_empty());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_empty_token_ends_pagination() {
        let all = collect_all(|_token| async {
            Ok::<_, String>(Page::new(vec![1u32], Some(String::new())))
        })
        .await
        .unwrap();

        assert_eq!(all, vec![1]);
    }

    #[tokio::test]
    async fn test_error_stops_stream() {
        let results: Vec<Result<Vec<u32>, String>> = pages(|token: Option<String>| async move {
            match token {
                None => Ok(Page::new(vec![1], Some("2".to_string()))),
                Some(_) => Err("boom".to_string()),
            }
        })
        .collect()
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok(vec![1]));
        assert_eq!(results[1], Err("boom".to_string()));
    }
}
