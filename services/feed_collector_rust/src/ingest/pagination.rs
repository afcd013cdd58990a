//! Bounded-concurrency paginated catalog fetch.
//!
//! The upstream does not report a total, so the fetcher probes page 0 and,
//! when that page comes back full, walks the page space in parallel windows
//! with early termination: the first empty page anywhere in a window stops
//! pagination after that window. Individual page failures count as empty
//! pages and never abort the whole fetch.

use futures_util::future::join_all;
use oddsfeed_rust_core::FeedError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Conservative ceiling when the total page count is unknown.
pub const MAX_PAGES: usize = 100;

/// Delay between page windows, bounds the upstream request rate.
const INTER_WINDOW_DELAY: Duration = Duration::from_millis(100);

/// Fetch all pages of an unknown-length catalog.
///
/// Windows are aligned to multiples of `concurrency` starting at page 0;
/// page 0 is served by the probe and not refetched. Results are appended
/// in page order.
pub async fn fetch_pages<T, F, Fut>(page_size: usize, concurrency: usize, fetch: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, FeedError>>,
{
    let mut items = run_page(&fetch, 0).await;
    if items.len() < page_size {
        // Short first page: the catalog fits in one page
        return items;
    }

    // Window 0 contains the already-probed page 0; with concurrency 1 it
    // would be empty, so start at page 1 directly.
    let mut window_start = if concurrency > 1 { 0 } else { 1 };
    loop {
        let pages: Vec<usize> = (window_start..window_start + concurrency)
            .filter(|p| *p != 0 && *p < MAX_PAGES)
            .collect();
        if pages.is_empty() {
            break;
        }

        let results = join_all(pages.iter().map(|p| run_page(&fetch, *p))).await;
        let mut halt = false;
        for page_items in results {
            if page_items.is_empty() {
                halt = true;
            } else {
                items.extend(page_items);
            }
        }
        if halt {
            break;
        }

        window_start += concurrency;
        if window_start >= MAX_PAGES {
            break;
        }
        tokio::time::sleep(INTER_WINDOW_DELAY).await;
    }

    items
}

async fn run_page<T, F, Fut>(fetch: &F, page: usize) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, FeedError>>,
{
    match fetch(page).await {
        Ok(items) => items,
        Err(e) => {
            warn!("Catalog page {} failed, treating as empty: {}", page, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Fetch double serving a fixed page layout and logging every request.
    fn scripted(
        pages: Vec<Vec<u32>>,
    ) -> (
        Arc<Mutex<Vec<usize>>>,
        impl Fn(usize) -> std::future::Ready<Result<Vec<u32>, FeedError>>,
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let fetch = move |page: usize| {
            log_clone.lock().unwrap().push(page);
            let items = pages.get(page).cloned().unwrap_or_default();
            std::future::ready(Ok(items))
        };
        (log, fetch)
    }

    #[tokio::test]
    async fn test_short_first_page_is_the_whole_catalog() {
        let (log, fetch) = scripted(vec![vec![1, 2], vec![3, 4, 5]]);
        let items = fetch_pages(3, 3, fetch).await;
        assert_eq!(items, vec![1, 2]);
        assert_eq!(*log.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_early_termination_never_requests_past_empty_window() {
        // Page layout: [full, full, empty, full]; the fourth page must
        // never be requested.
        let (log, fetch) = scripted(vec![
            vec![1, 2, 3],
            vec![4, 5, 6],
            vec![],
            vec![7, 8, 9],
        ]);
        let items = fetch_pages(3, 3, fetch).await;
        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        let mut requested = log.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failed_page_counts_as_empty() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let fetch = move |page: usize| {
            log_clone.lock().unwrap().push(page);
            std::future::ready(match page {
                0 | 1 => Ok(vec![page as u32; 2]),
                _ => Err(FeedError::UpstreamUnavailable("boom".to_string())),
            })
        };
        let items = fetch_pages(2, 2, fetch).await;
        // Page 0 probed, window {1}, then window {2, 3} fails and halts
        assert_eq!(items, vec![0, 0, 1, 1]);
        let mut requested = log.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_window_results_keep_page_order() {
        let (_, fetch) = scripted(vec![
            vec![0, 0],
            vec![1, 1],
            vec![2, 2],
            vec![3, 3],
            vec![4],
        ]);
        let items = fetch_pages(2, 2, fetch).await;
        assert_eq!(items, vec![0, 0, 1, 1, 2, 2, 3, 3, 4]);
    }
}
