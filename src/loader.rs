use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use crate::data::CommentService;
use crate::forum::{Comment, Pagination};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("response is for page {got}, requested page {requested}")]
    UnexpectedPage { requested: u64, got: u64 },
    #[error("response for page {page} advertises non-sequential next page {next}")]
    NonSequentialNext { page: u64, next: u64 },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("thread comments not loaded yet")]
    NotLoaded,
    #[error("thread comments already loaded")]
    AlreadyLoaded,
    #[error("no more comment pages")]
    NoMorePages,
    #[error("thread view was reset while a fetch was in flight")]
    Stale,
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("fetch comments page {page}")]
    Fetch {
        page: u64,
        #[source]
        source: anyhow::Error,
    },
}

/// Pagination progress for one thread's comment list. The next request is
/// always `page + 1`; once `next` is `None` the cursor is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u64,
    pub num_pages: u64,
    pub next: Option<u64>,
}

impl PageCursor {
    pub fn first(pagination: &Pagination) -> Result<Self, CursorError> {
        Self::from_response(1, pagination)
    }

    pub fn advance(&self, pagination: &Pagination) -> Result<Self, CursorError> {
        // The next request is always the page after the last one applied.
        Self::from_response(self.page + 1, pagination)
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    fn from_response(requested: u64, pagination: &Pagination) -> Result<Self, CursorError> {
        if pagination.page != requested {
            return Err(CursorError::UnexpectedPage {
                requested,
                got: pagination.page,
            });
        }
        if let Some(next) = pagination.next {
            if next != pagination.page + 1 {
                return Err(CursorError::NonSequentialNext {
                    page: pagination.page,
                    next,
                });
            }
        }
        Ok(PageCursor {
            page: pagination.page,
            num_pages: pagination.num_pages,
            next: pagination.next,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct ThreadSlot {
    state: Option<ThreadComments>,
    // Bumped by reset() so late responses for a discarded view are dropped.
    generation: u64,
}

#[derive(Debug, Clone)]
struct ThreadComments {
    comments: Vec<Comment>,
    cursor: PageCursor,
}

/// Accumulates comments for each thread one page at a time. Comments are only
/// ever appended in page order; a failed fetch leaves the prior state (and the
/// cursor) untouched so the caller can retry the same page.
pub struct CommentLoader {
    service: Arc<dyn CommentService>,
    threads: RwLock<HashMap<String, ThreadSlot>>,
}

impl CommentLoader {
    pub fn new(service: Arc<dyn CommentService>) -> Self {
        Self {
            service,
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch page 1 of a thread's comments. Errors with `AlreadyLoaded` if the
    /// thread already has comments; use `reset` first to reload from scratch.
    pub fn load_first_page(&self, thread_id: &str) -> Result<Vec<Comment>, LoadError> {
        let generation = {
            let threads = self.threads.read();
            let slot = threads.get(thread_id);
            if slot.map_or(false, |slot| slot.state.is_some()) {
                return Err(LoadError::AlreadyLoaded);
            }
            slot.map_or(0, |slot| slot.generation)
        };

        let page = self.fetch(thread_id, 1)?;

        let mut threads = self.threads.write();
        let slot = threads.entry(thread_id.to_string()).or_default();
        if slot.generation != generation {
            return Err(LoadError::Stale);
        }
        if let Some(state) = &slot.state {
            // A duplicate first-page request already landed; same data, so
            // return the existing snapshot instead of appending twice.
            return Ok(state.comments.clone());
        }
        let cursor = PageCursor::first(&page.pagination)?;
        debug!(
            "loader: thread {} page 1/{} loaded ({} comments)",
            thread_id,
            cursor.num_pages,
            page.results.len()
        );
        slot.state = Some(ThreadComments {
            comments: page.results.clone(),
            cursor,
        });
        Ok(page.results)
    }

    /// Fetch the next page and append its comments. Legal only after
    /// `load_first_page` and while `has_more` is true.
    pub fn load_next_page(&self, thread_id: &str) -> Result<Vec<Comment>, LoadError> {
        let (generation, requested) = {
            let threads = self.threads.read();
            let slot = threads.get(thread_id).ok_or(LoadError::NotLoaded)?;
            let state = slot.state.as_ref().ok_or(LoadError::NotLoaded)?;
            match state.cursor.next {
                Some(next) => (slot.generation, next),
                None => return Err(LoadError::NoMorePages),
            }
        };

        let page = self.fetch(thread_id, requested)?;

        let mut threads = self.threads.write();
        let slot = threads.get_mut(thread_id).ok_or(LoadError::Stale)?;
        if slot.generation != generation {
            return Err(LoadError::Stale);
        }
        let state = slot.state.as_mut().ok_or(LoadError::Stale)?;
        if state.cursor.page >= requested {
            // Another caller already applied this page; drop the duplicate.
            return Ok(state.comments.clone());
        }
        let cursor = state.cursor.advance(&page.pagination)?;
        debug!(
            "loader: thread {} page {}/{} loaded ({} comments)",
            thread_id,
            cursor.page,
            cursor.num_pages,
            page.results.len()
        );
        state.comments.extend(page.results);
        state.cursor = cursor;
        Ok(state.comments.clone())
    }

    /// True while there are unfetched pages, i.e. the "load more" affordance
    /// should be offered. False before the first page and after the last.
    pub fn has_more(&self, thread_id: &str) -> bool {
        self.threads
            .read()
            .get(thread_id)
            .and_then(|slot| slot.state.as_ref())
            .map_or(false, |state| state.cursor.has_more())
    }

    /// Snapshot of the comments accumulated so far, in page order.
    pub fn comments(&self, thread_id: &str) -> Vec<Comment> {
        self.threads
            .read()
            .get(thread_id)
            .and_then(|slot| slot.state.as_ref())
            .map_or_else(Vec::new, |state| state.comments.clone())
    }

    pub fn cursor(&self, thread_id: &str) -> Option<PageCursor> {
        self.threads
            .read()
            .get(thread_id)
            .and_then(|slot| slot.state.as_ref())
            .map(|state| state.cursor)
    }

    /// Discard a thread's comments and cursor, e.g. when its view is torn
    /// down. Any fetch still in flight for the old view is dropped on arrival.
    pub fn reset(&self, thread_id: &str) {
        let mut threads = self.threads.write();
        let slot = threads.entry(thread_id.to_string()).or_default();
        slot.state = None;
        slot.generation += 1;
    }

    fn fetch(&self, thread_id: &str, page: u64) -> Result<crate::forum::Page<Comment>, LoadError> {
        self.service
            .fetch_comments(thread_id, page)
            .map_err(|source| LoadError::Fetch { page, source })
    }
}

pub fn pagination(page: u64, num_pages: u64) -> Pagination {
    Pagination {
        page,
        num_pages,
        next: if page < num_pages {
            Some(page + 1)
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use anyhow::bail;
    use parking_lot::Mutex;

    use super::*;
    use crate::data::{mock_comment, MockCommentService};
    use crate::forum::Page;

    fn paged_loader(pages: Vec<Vec<Comment>>) -> CommentLoader {
        CommentLoader::new(Arc::new(MockCommentService::new(pages)))
    }

    fn sample_pages() -> Vec<Vec<Comment>> {
        vec![
            vec![
                mock_comment("t1", "c1", "first comment"),
                mock_comment("t1", "c2", "second comment"),
            ],
            vec![mock_comment("t1", "c3", "third comment")],
        ]
    }

    #[test]
    fn first_page_then_load_more_appends_in_order() {
        let loader = paged_loader(sample_pages());

        let first = loader.load_first_page("t1").unwrap();
        assert_eq!(first.len(), 2);
        assert!(loader.has_more("t1"));

        let all = loader.load_next_page("t1").unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(!loader.has_more("t1"));

        let unique: HashSet<_> = ids.into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn load_more_past_last_page_is_rejected() {
        let loader = paged_loader(sample_pages());
        loader.load_first_page("t1").unwrap();
        loader.load_next_page("t1").unwrap();
        assert!(matches!(
            loader.load_next_page("t1"),
            Err(LoadError::NoMorePages)
        ));
        // Terminal state persists.
        assert!(!loader.has_more("t1"));
    }

    #[test]
    fn single_page_thread_is_terminal_immediately() {
        let loader = paged_loader(vec![vec![mock_comment("t1", "c1", "only")]]);
        loader.load_first_page("t1").unwrap();
        assert!(!loader.has_more("t1"));
    }

    #[test]
    fn next_page_before_first_is_rejected() {
        let loader = paged_loader(sample_pages());
        assert!(matches!(
            loader.load_next_page("t1"),
            Err(LoadError::NotLoaded)
        ));
        assert!(!loader.has_more("t1"));
        assert!(loader.comments("t1").is_empty());
    }

    #[test]
    fn duplicate_first_page_load_is_rejected() {
        let loader = paged_loader(sample_pages());
        loader.load_first_page("t1").unwrap();
        assert!(matches!(
            loader.load_first_page("t1"),
            Err(LoadError::AlreadyLoaded)
        ));
        assert_eq!(loader.comments("t1").len(), 2);
    }

    #[test]
    fn threads_are_tracked_independently() {
        let loader = paged_loader(sample_pages());
        loader.load_first_page("t1").unwrap();
        loader.load_first_page("t2").unwrap();
        loader.load_next_page("t2").unwrap();
        assert_eq!(loader.comments("t1").len(), 2);
        assert_eq!(loader.comments("t2").len(), 3);
        assert!(loader.has_more("t1"));
        assert!(!loader.has_more("t2"));
    }

    struct FlakyService {
        inner: MockCommentService,
        fail_pages: Mutex<HashSet<u64>>,
    }

    impl CommentService for FlakyService {
        fn fetch_comments(&self, thread_id: &str, page: u64) -> anyhow::Result<Page<Comment>> {
            if self.fail_pages.lock().remove(&page) {
                bail!("connection reset by peer");
            }
            self.inner.fetch_comments(thread_id, page)
        }
    }

    #[test]
    fn fetch_failure_keeps_prior_state_and_allows_retry() {
        let service = Arc::new(FlakyService {
            inner: MockCommentService::new(sample_pages()),
            fail_pages: Mutex::new([2].into_iter().collect()),
        });
        let loader = CommentLoader::new(service);

        loader.load_first_page("t1").unwrap();
        let err = loader.load_next_page("t1").unwrap_err();
        assert!(matches!(err, LoadError::Fetch { page: 2, .. }));

        // Prior comments intact, cursor unchanged, retry succeeds.
        assert_eq!(loader.comments("t1").len(), 2);
        assert!(loader.has_more("t1"));
        let all = loader.load_next_page("t1").unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn first_page_failure_leaves_thread_unloaded() {
        let service = Arc::new(FlakyService {
            inner: MockCommentService::new(sample_pages()),
            fail_pages: Mutex::new([1].into_iter().collect()),
        });
        let loader = CommentLoader::new(service);

        assert!(matches!(
            loader.load_first_page("t1"),
            Err(LoadError::Fetch { page: 1, .. })
        ));
        assert!(loader.comments("t1").is_empty());
        assert!(!loader.has_more("t1"));

        loader.load_first_page("t1").unwrap();
        assert_eq!(loader.comments("t1").len(), 2);
    }

    struct ResettingService {
        inner: MockCommentService,
        loader: Mutex<Option<Arc<CommentLoader>>>,
        reset_on_page: u64,
    }

    impl CommentService for ResettingService {
        fn fetch_comments(&self, thread_id: &str, page: u64) -> anyhow::Result<Page<Comment>> {
            if page == self.reset_on_page {
                if let Some(loader) = self.loader.lock().take() {
                    loader.reset(thread_id);
                }
            }
            self.inner.fetch_comments(thread_id, page)
        }
    }

    #[test]
    fn late_response_after_reset_is_discarded() {
        let service = Arc::new(ResettingService {
            inner: MockCommentService::new(sample_pages()),
            loader: Mutex::new(None),
            reset_on_page: 2,
        });
        let loader = Arc::new(CommentLoader::new(service.clone()));
        *service.loader.lock() = Some(loader.clone());

        loader.load_first_page("t1").unwrap();
        // The view is torn down while the page-2 fetch is in flight.
        assert!(matches!(loader.load_next_page("t1"), Err(LoadError::Stale)));
        assert!(loader.comments("t1").is_empty());

        // The thread can be loaded fresh afterwards.
        loader.load_first_page("t1").unwrap();
        assert_eq!(loader.comments("t1").len(), 2);
    }

    #[test]
    fn cursor_rejects_mismatched_page() {
        let err = PageCursor::first(&pagination(3, 4)).unwrap_err();
        assert_eq!(
            err,
            CursorError::UnexpectedPage {
                requested: 1,
                got: 3
            }
        );
    }

    #[test]
    fn cursor_rejects_non_sequential_next() {
        let bad = Pagination {
            page: 1,
            num_pages: 5,
            next: Some(4),
        };
        let err = PageCursor::first(&bad).unwrap_err();
        assert_eq!(err, CursorError::NonSequentialNext { page: 1, next: 4 });
    }

    #[test]
    fn cursor_advances_monotonically() {
        let cursor = PageCursor::first(&pagination(1, 3)).unwrap();
        assert_eq!(cursor.next, Some(2));
        let cursor = cursor.advance(&pagination(2, 3)).unwrap();
        assert_eq!(cursor.next, Some(3));
        let cursor = cursor.advance(&pagination(3, 3)).unwrap();
        assert_eq!(cursor.next, None);
        assert!(!cursor.has_more());
    }
}
