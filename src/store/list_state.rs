use crate::api::Page;

/// What a failed fetch does to `has_more`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
  /// Keep the previous `has_more` so the user can retry the next page
  #[default]
  KeepHasMore,
  /// Force `has_more` to false, stopping further pagination until a refresh
  StopPagination,
}

/// Per-resource record of loaded items and pagination cursors.
///
/// Only the owning store mutates it, through the transition methods below.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
  items: Vec<T>,
  is_loading: bool,
  error: Option<String>,
  current_page: u32,
  total_pages: u32,
  total_items: u64,
  has_more: bool,
}

impl<T> Default for ListState<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      is_loading: false,
      error: None,
      current_page: 1,
      total_pages: 0,
      total_items: 0,
      has_more: true,
    }
  }
}

impl<T> ListState<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn is_loading(&self) -> bool {
    self.is_loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn current_page(&self) -> u32 {
    self.current_page
  }

  pub fn total_pages(&self) -> u32 {
    self.total_pages
  }

  pub fn total_items(&self) -> u64 {
    self.total_items
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub(crate) fn items_mut(&mut self) -> &mut [T] {
    &mut self.items
  }

  /// A request went out. Items stay as they are until it resolves.
  pub(crate) fn begin(&mut self) {
    self.is_loading = true;
    self.error = None;
  }

  /// First page arrived: replace everything loaded so far.
  pub(crate) fn resolve_first(&mut self, page: Page<T>) {
    self.items = page.items;
    self.current_page = 1;
    self.finish(page.total_pages, page.total_items);
  }

  /// A later page arrived: append and advance the cursor.
  pub(crate) fn resolve_next(&mut self, page: Page<T>) {
    self.items.extend(page.items);
    self.current_page = page.page_number;
    self.finish(page.total_pages, page.total_items);
  }

  pub(crate) fn reject(&mut self, message: String, policy: ErrorPolicy) {
    self.is_loading = false;
    self.error = Some(message);
    if policy == ErrorPolicy::StopPagination {
      self.has_more = false;
    }
  }

  fn finish(&mut self, total_pages: u32, total_items: u64) {
    self.total_pages = total_pages;
    self.total_items = total_items;
    self.has_more = self.current_page < self.total_pages;
    self.is_loading = false;
  }
}
