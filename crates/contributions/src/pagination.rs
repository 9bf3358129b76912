//! Lazy cursor pagination over any connection-shaped query.
//!
//! A [`Paginator`] owns a page-fetch function `f(after) -> Page<T>` and
//! hands out items one at a time. Page `k + 1` is requested only after
//! page `k` is exhausted, with `after` set to page `k`'s `endCursor`; the
//! first page receives no cursor. Iteration ends the first time a page
//! reports `hasNextPage = false`, and a paginator cannot be restarted.
//! A page that claims a successor but carries no `endCursor` is a protocol
//! error.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use crate::error::{Result, ScanError};
use crate::types::Page;

/// Boxed future returned by a page-fetch function.
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + Send + 'a>>;

type FetchFn<'a, T> = Box<dyn FnMut(Option<String>) -> PageFuture<'a, T> + Send + 'a>;

/// Forward-only, lazily fetched sequence of items from a cursor-paged query.
pub struct Paginator<'a, T> {
    fetch: FetchFn<'a, T>,
    buffer: VecDeque<T>,
    /// Cursor for the next request; `None` before the first page.
    after: Option<String>,
    has_more: bool,
    pages_fetched: usize,
}

impl<'a, T: Send + 'a> Paginator<'a, T> {
    /// Build a paginator from a page-fetch function.
    pub fn new<F, Fut>(mut fetch: F) -> Self
    where
        F: FnMut(Option<String>) -> Fut + Send + 'a,
        Fut: Future<Output = Result<Page<T>>> + Send + 'a,
    {
        Self {
            fetch: Box::new(move |after| Box::pin(fetch(after))),
            buffer: VecDeque::new(),
            after: None,
            has_more: true,
            pages_fetched: 0,
        }
    }

    /// Next item, fetching the next page when the buffer runs dry.
    ///
    /// Returns `None` once the last page has been drained. A fetch error is
    /// returned as `Some(Err(_))` and ends the sequence.
    pub async fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if !self.has_more {
                return None;
            }

            let page = match (self.fetch)(self.after.take()).await {
                Ok(page) => page,
                Err(e) => {
                    self.has_more = false;
                    return Some(Err(e));
                }
            };
            self.pages_fetched += 1;
            tracing::trace!(
                page = self.pages_fetched,
                count = page.items.len(),
                has_next_page = page.page_info.has_next_page,
                "Fetched page"
            );

            if page.page_info.has_next_page && page.page_info.end_cursor.is_none() {
                self.has_more = false;
                return Some(Err(ScanError::protocol("next page without cursor")));
            }
            self.has_more = page.page_info.has_next_page;
            self.after = page.page_info.end_cursor;
            self.buffer.extend(page.items);
        }
    }

    /// Drain the remaining items into a `Vec`, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageInfo;
    use std::sync::{Arc, Mutex};

    fn page(items: &[u32], next: Option<&str>) -> Page<u32> {
        Page {
            items: items.to_vec(),
            page_info: PageInfo {
                has_next_page: next.is_some(),
                end_cursor: next.map(String::from).or_else(|| Some("last".into())),
            },
        }
    }

    /// Serve canned pages in order and record every `after` argument.
    fn scripted(
        pages: Vec<Page<u32>>,
    ) -> (
        impl FnMut(Option<String>) -> std::future::Ready<Result<Page<u32>>> + Send,
        Arc<Mutex<Vec<Option<String>>>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&calls);
        let mut pages = VecDeque::from(pages);
        let fetch = move |after: Option<String>| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(after);
            let next = pages
                .pop_front()
                .ok_or_else(|| ScanError::protocol("requested a page past the end"));
            std::future::ready(next)
        };
        (fetch, calls)
    }

    #[tokio::test]
    async fn test_yields_concatenation_of_pages_in_order_and_terminates() {
        let (fetch, calls) = scripted(vec![
            page(&[1, 2], Some("c1")),
            page(&[3], Some("c2")),
            page(&[4, 5], None),
        ]);

        let items = Paginator::new(fetch).try_collect().await.expect("all pages");

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_threads_end_cursor_into_next_request() {
        let (fetch, calls) = scripted(vec![
            page(&[1], Some("c1")),
            page(&[2], Some("c2")),
            page(&[3], None),
        ]);

        Paginator::new(fetch).try_collect().await.expect("all pages");

        assert_eq!(
            *calls.lock().unwrap(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_is_lazy_until_the_buffer_runs_dry() {
        let (fetch, calls) = scripted(vec![page(&[1, 2], Some("c1")), page(&[3], None)]);
        let mut paginator = Paginator::new(fetch);

        assert_eq!(calls.lock().unwrap().len(), 0);
        assert_eq!(paginator.next().await.unwrap().unwrap(), 1);
        assert_eq!(paginator.next().await.unwrap().unwrap(), 2);
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(paginator.next().await.unwrap().unwrap(), 3);
        assert_eq!(paginator.pages_fetched(), 2);
        assert!(paginator.next().await.is_none());
        assert!(paginator.next().await.is_none());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_final_page_ends_iteration() {
        let (fetch, _) = scripted(vec![page(&[], None)]);
        let items = Paginator::new(fetch).try_collect().await.expect("empty");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned_once_and_ends_sequence() {
        let (fetch, calls) = scripted(vec![page(&[1], Some("c1"))]);
        let mut paginator = Paginator::new(fetch);

        assert_eq!(paginator.next().await.unwrap().unwrap(), 1);
        assert!(matches!(
            paginator.next().await,
            Some(Err(ScanError::Protocol { .. }))
        ));
        assert!(paginator.next().await.is_none());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_next_page_without_cursor_is_protocol_error() {
        let dangling = Page {
            items: vec![2],
            page_info: PageInfo {
                has_next_page: true,
                end_cursor: None,
            },
        };
        let (fetch, calls) = scripted(vec![page(&[1], Some("c1")), dangling, page(&[3], None)]);
        let mut paginator = Paginator::new(fetch);

        assert_eq!(paginator.next().await.unwrap().unwrap(), 1);
        match paginator.next().await {
            Some(Err(ScanError::Protocol { message })) => {
                assert_eq!(message, "next page without cursor")
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert!(paginator.next().await.is_none());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
