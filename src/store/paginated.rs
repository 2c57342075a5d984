//! Paginated list store with load-more semantics.
//!
//! A `PaginatedStore<T>` owns one `ListState<T>` and the fetcher that fills it.
//! Requests run as spawned tasks and hand their result back over a channel;
//! the owner applies results with `poll()` from its event loop or awaits them
//! with `settle()`. Nothing else writes to the state.
//!
//! # Example
//!
//! ```ignore
//! let api = api_client.clone();
//! let mut store = PaginatedStore::new("notifications", 10, move |params| {
//!     let api = api.clone();
//!     async move { api.notifications(&params).await }
//! });
//!
//! store.fetch_first_page(Vec::new());
//! store.settle().await;
//!
//! if store.has_more() {
//!     store.fetch_next_page();
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::list_state::{ErrorPolicy, ListState};
use super::traits::ListItem;
use crate::api::{ApiError, ListParams, Page};

type FetchResult<T> = Result<Page<T>, ApiError>;

/// A boxed future that returns one page
type BoxFuture<T> = Pin<Box<dyn Future<Output = FetchResult<T>> + Send>>;

/// A factory function that creates futures for fetching a page
type FetcherFn<T> = Box<dyn Fn(ListParams) -> BoxFuture<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
  First,
  Next,
}

struct Pending<T> {
  kind: FetchKind,
  receiver: mpsc::UnboundedReceiver<FetchResult<T>>,
}

pub struct PaginatedStore<T> {
  name: &'static str,
  state: ListState<T>,
  fetcher: FetcherFn<T>,
  pending: Option<Pending<T>>,
  page_size: u32,
  /// Filter context of the last first-page request, reused for later pages
  filters: Vec<(String, String)>,
  error_policy: ErrorPolicy,
}

impl<T: ListItem> PaginatedStore<T> {
  /// Create a store around a fetcher.
  ///
  /// The fetcher is called once per request with the page, limit and filters.
  pub fn new<F, Fut>(name: &'static str, page_size: u32, fetcher: F) -> Self
  where
    F: Fn(ListParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
  {
    Self {
      name,
      state: ListState::new(),
      fetcher: Box::new(move |params| Box::pin(fetcher(params))),
      pending: None,
      page_size: page_size.max(1),
      filters: Vec::new(),
      error_policy: ErrorPolicy::default(),
    }
  }

  pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
    self.error_policy = policy;
    self
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn state(&self) -> &ListState<T> {
    &self.state
  }

  pub fn items(&self) -> &[T] {
    self.state.items()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  pub fn has_more(&self) -> bool {
    self.state.has_more()
  }

  pub fn current_page(&self) -> u32 {
    self.state.current_page()
  }

  /// Load page 1 and replace whatever is loaded.
  ///
  /// Always issues a request: an in-flight request is abandoned and its result
  /// will be ignored. Returns `true` since a request was started.
  pub fn fetch_first_page(&mut self, filters: Vec<(String, String)>) -> bool {
    if self.pending.is_some() {
      debug!(store = self.name, "Abandoning in-flight request for refresh");
    }
    self.filters = filters;
    self.start(FetchKind::First, 1);
    true
  }

  /// Load the page after `current_page` and append it.
  ///
  /// This is a no-op returning `false` while a request is in flight or when
  /// there is nothing more to load.
  pub fn fetch_next_page(&mut self) -> bool {
    if self.state.is_loading() {
      debug!(store = self.name, "Ignoring next page while loading");
      return false;
    }
    if !self.state.has_more() {
      return false;
    }
    let page = self.state.current_page() + 1;
    self.start(FetchKind::Next, page);
    true
  }

  /// Restore the initial state. A request still in flight is dropped.
  pub fn reset(&mut self) {
    self.pending = None;
    self.filters.clear();
    self.state = ListState::new();
  }

  /// Patch every loaded item with id `item_id` in place.
  ///
  /// Returns `false` when no loaded item matches, which is not an error: the
  /// item may sit on a page that was never fetched.
  pub fn apply_patch<F>(&mut self, item_id: &str, mut patch: F) -> bool
  where
    F: FnMut(&mut T),
  {
    let mut found = false;
    for item in self
      .state
      .items_mut()
      .iter_mut()
      .filter(|item| item.item_id() == item_id)
    {
      patch(item);
      found = true;
    }
    found
  }

  /// Apply a finished request, if any, without blocking.
  ///
  /// Returns `true` if the state changed. Call this from the event loop tick.
  pub fn poll(&mut self) -> bool {
    let pending = match &mut self.pending {
      Some(pending) => pending,
      None => return false,
    };

    let result = match pending.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => None,
    };

    self.complete(result);
    true
  }

  /// Wait for the in-flight request, if any, and apply it.
  ///
  /// Returns `true` if the state changed.
  pub async fn settle(&mut self) -> bool {
    let result = match &mut self.pending {
      Some(pending) => pending.receiver.recv().await,
      None => return false,
    };

    self.complete(result);
    true
  }

  /// Internal: start a request for `page`
  fn start(&mut self, kind: FetchKind, page: u32) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.pending = Some(Pending { kind, receiver: rx });
    self.state.begin();

    debug!(
      store = self.name,
      entity = T::entity_type(),
      page,
      "Fetching page"
    );

    let params = ListParams::new(page, self.page_size).with_filters(self.filters.clone());
    let future = (self.fetcher)(params);
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the store may have been reset or dropped
      let _ = tx.send(result);
    });
  }

  /// Internal: apply the result of the pending request
  fn complete(&mut self, result: Option<FetchResult<T>>) {
    let Some(pending) = self.pending.take() else {
      return;
    };

    match result {
      Some(Ok(page)) => {
        debug!(
          store = self.name,
          page = page.page_number,
          count = page.items.len(),
          total_pages = page.total_pages,
          "Page loaded"
        );
        match pending.kind {
          FetchKind::First => self.state.resolve_first(page),
          FetchKind::Next => self.state.resolve_next(page),
        }
      }
      Some(Err(e)) => {
        warn!(store = self.name, kind = ?e.kind, error = %e.message, "Page request failed");
        self.state.reject(e.message, self.error_policy);
      }
      None => {
        // Sender dropped without sending - the task died
        self
          .state
          .reject("Request was cancelled".to_string(), self.error_policy);
      }
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PaginatedStore<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PaginatedStore")
      .field("name", &self.name)
      .field("state", &self.state)
      .field("page_size", &self.page_size)
      .field("error_policy", &self.error_policy)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq)]
  pub(crate) struct Row {
    pub id: String,
    pub flag: bool,
  }

  impl ListItem for Row {
    fn item_id(&self) -> &str {
      &self.id
    }

    fn entity_type() -> &'static str {
      "row"
    }
  }

  pub(crate) fn row(id: &str) -> Row {
    Row {
      id: id.to_string(),
      flag: false,
    }
  }

  pub(crate) fn page_of<T>(items: Vec<T>, page_number: u32, total_pages: u32) -> Page<T> {
    Page {
      total_items: (total_pages * 2) as u64,
      items,
      page_number,
      page_size: 2,
      total_pages,
    }
  }

  /// Scripted server: answers each page number from a table and counts calls.
  #[derive(Clone, Default)]
  struct Script {
    pages: Arc<Mutex<HashMap<u32, FetchResult<Row>>>>,
    calls: Arc<AtomicU32>,
    seen: Arc<Mutex<Vec<ListParams>>>,
    delay_ms: u64,
  }

  impl Script {
    fn answer(&self, page: u32, result: FetchResult<Row>) {
      self.pages.lock().unwrap().insert(page, result);
    }

    fn calls(&self) -> u32 {
      self.calls.load(Ordering::SeqCst)
    }

    fn store(&self) -> PaginatedStore<Row> {
      let script = self.clone();
      PaginatedStore::new("rows", 2, move |params: ListParams| {
        let script = script.clone();
        async move {
          script.calls.fetch_add(1, Ordering::SeqCst);
          script.seen.lock().unwrap().push(params.clone());
          if script.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
          }
          script
            .pages
            .lock()
            .unwrap()
            .get(&params.page)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::network("no such page")))
        }
      })
    }
  }

  fn ids(store: &PaginatedStore<Row>) -> Vec<&str> {
    store.items().iter().map(|r| r.id.as_str()).collect()
  }

  #[tokio::test]
  async fn test_load_more_scenario() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A"), row("B")], 1, 3)));
    script.answer(2, Ok(page_of(vec![row("C"), row("D")], 2, 3)));
    script.answer(3, Ok(page_of(vec![row("E")], 3, 3)));
    let mut store = script.store();

    assert!(store.items().is_empty());
    assert_eq!(store.current_page(), 1);
    assert!(store.has_more());

    store.fetch_first_page(Vec::new());
    assert!(store.is_loading());
    assert!(store.settle().await);
    assert_eq!(ids(&store), vec!["A", "B"]);
    assert_eq!(store.current_page(), 1);
    assert!(store.has_more());

    assert!(store.fetch_next_page());
    store.settle().await;
    assert_eq!(ids(&store), vec!["A", "B", "C", "D"]);
    assert_eq!(store.current_page(), 2);
    assert!(store.has_more());

    assert!(store.fetch_next_page());
    store.settle().await;
    assert_eq!(ids(&store), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(store.current_page(), 3);
    assert!(!store.has_more());
    assert!(!store.is_loading());

    // Nothing left to load
    assert!(!store.fetch_next_page());
    assert_eq!(script.calls(), 3);
  }

  #[tokio::test]
  async fn test_next_page_keeps_duplicates() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A"), row("B")], 1, 2)));
    script.answer(2, Ok(page_of(vec![row("B"), row("C")], 2, 2)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;
    store.fetch_next_page();
    store.settle().await;

    assert_eq!(ids(&store), vec!["A", "B", "B", "C"]);
  }

  #[tokio::test]
  async fn test_refresh_replaces_appended_pages() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A"), row("B")], 1, 3)));
    script.answer(2, Ok(page_of(vec![row("C"), row("D")], 2, 3)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;
    store.fetch_next_page();
    store.settle().await;
    assert_eq!(store.items().len(), 4);

    script.answer(1, Ok(page_of(vec![row("Z")], 1, 1)));
    store.fetch_first_page(Vec::new());
    store.settle().await;

    assert_eq!(ids(&store), vec!["Z"]);
    assert_eq!(store.current_page(), 1);
    assert!(!store.has_more());
  }

  #[tokio::test]
  async fn test_next_page_while_loading_is_noop() {
    let script = Script {
      delay_ms: 50,
      ..Script::default()
    };
    script.answer(1, Ok(page_of(vec![row("A")], 1, 2)));
    script.answer(2, Ok(page_of(vec![row("B")], 2, 2)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;

    assert!(store.fetch_next_page());
    let before = store.state().clone();

    // Double click
    assert!(!store.fetch_next_page());
    assert_eq!(store.state(), &before);

    store.settle().await;
    assert_eq!(ids(&store), vec!["A", "B"]);
    assert_eq!(script.calls(), 2);
  }

  #[tokio::test]
  async fn test_first_page_error_keeps_items() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A")], 1, 2)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;

    script.answer(1, Err(ApiError::network("Network error")));
    store.fetch_first_page(Vec::new());
    assert_eq!(store.error(), None);
    store.settle().await;

    assert!(!store.is_loading());
    assert_eq!(store.error(), Some("Network error"));
    assert_eq!(ids(&store), vec!["A"]);
    assert!(store.has_more());
  }

  #[tokio::test]
  async fn test_next_page_error_keeps_cursor() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A")], 1, 3)));
    script.answer(2, Err(ApiError::network("Network error")));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;
    store.fetch_next_page();
    store.settle().await;

    assert_eq!(store.error(), Some("Network error"));
    assert_eq!(store.current_page(), 1);
    assert_eq!(ids(&store), vec!["A"]);

    // Retry asks for the same page again
    script.answer(2, Ok(page_of(vec![row("B")], 2, 3)));
    assert!(store.fetch_next_page());
    store.settle().await;
    assert_eq!(store.current_page(), 2);
    assert_eq!(store.error(), None);
  }

  #[tokio::test]
  async fn test_stop_pagination_policy() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A")], 1, 3)));
    script.answer(2, Err(ApiError::network("Network error")));
    let mut store = script.store().with_error_policy(ErrorPolicy::StopPagination);

    store.fetch_first_page(Vec::new());
    store.settle().await;
    store.fetch_next_page();
    store.settle().await;

    assert!(!store.has_more());
    assert!(!store.fetch_next_page());
    assert_eq!(script.calls(), 2);
  }

  #[tokio::test]
  async fn test_reset_ignores_late_result() {
    let script = Script {
      delay_ms: 30,
      ..Script::default()
    };
    script.answer(1, Ok(page_of(vec![row("A")], 1, 1)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.reset();
    assert!(!store.is_loading());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!store.poll());
    assert!(!store.settle().await);
    assert!(store.items().is_empty());
    assert!(store.has_more());
  }

  #[tokio::test]
  async fn test_refresh_abandons_in_flight_next_page() {
    let script = Script {
      delay_ms: 30,
      ..Script::default()
    };
    script.answer(1, Ok(page_of(vec![row("A")], 1, 3)));
    script.answer(2, Ok(page_of(vec![row("B")], 2, 3)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    store.settle().await;
    store.fetch_next_page();
    store.fetch_first_page(Vec::new());
    store.settle().await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!store.poll());
    assert_eq!(ids(&store), vec!["A"]);
    assert_eq!(store.current_page(), 1);
  }

  #[tokio::test]
  async fn test_poll_applies_result() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A")], 1, 1)));
    let mut store = script.store();

    store.fetch_first_page(Vec::new());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(store.poll());
    assert_eq!(ids(&store), vec!["A"]);
    assert!(!store.poll());
  }

  #[tokio::test]
  async fn test_filters_carry_to_next_page() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A")], 1, 2)));
    script.answer(2, Ok(page_of(vec![row("B")], 2, 2)));
    let mut store = script.store();

    store.fetch_first_page(vec![("q".to_string(), "math".to_string())]);
    store.settle().await;
    store.fetch_next_page();
    store.settle().await;

    let seen = script.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].page, 2);
    assert_eq!(seen[1].limit, 2);
    assert_eq!(seen[1].filters, vec![("q".to_string(), "math".to_string())]);
  }

  #[tokio::test]
  async fn test_apply_patch() {
    let script = Script::default();
    script.answer(1, Ok(page_of(vec![row("A"), row("B"), row("C")], 1, 1)));
    let mut store = script.store();
    store.fetch_first_page(Vec::new());
    store.settle().await;

    assert!(store.apply_patch("B", |r| r.flag = true));
    assert_eq!(ids(&store), vec!["A", "B", "C"]);
    assert!(!store.items()[0].flag);
    assert!(store.items()[1].flag);
    assert!(!store.items()[2].flag);

    let before = store.state().clone();
    assert!(!store.apply_patch("missing", |r| r.flag = true));
    assert_eq!(store.state(), &before);
  }
}
