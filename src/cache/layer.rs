//! Cache layer that orchestrates keyed caching with network fetching.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::storage::{CacheStorage, MemoryStorage, StoredEntry};
use super::traits::{CacheResult, Endpoint};
use crate::api::ApiError;

/// Keyed request cache over a storage backend, shared by every clone.
///
/// Values are stored as JSON so one table can hold every endpoint's value
/// type. Storage failures are logged and treated as misses; they never fail
/// a fetch that the network answered.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  ttl_overrides: Arc<HashMap<&'static str, Duration>>,
  /// Held for every read-merge-write of an entry
  write_lock: Arc<Mutex<()>>,
}

impl CacheLayer {
  pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
    Self {
      storage,
      ttl_overrides: Arc::new(HashMap::new()),
      write_lock: Arc::new(Mutex::new(())),
    }
  }

  /// A cache that forgets everything when the process exits.
  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryStorage::new()))
  }

  /// Override an endpoint's time-to-live.
  pub fn with_keep_unused_for(mut self, endpoint: &'static str, ttl: Duration) -> Self {
    Arc::make_mut(&mut self.ttl_overrides).insert(endpoint, ttl);
    self
  }

  /// Stable, fixed-length key for an endpoint call.
  pub fn key_for<E: Endpoint>(args: &E::Args) -> String {
    let mut hasher = Sha256::new();
    hasher.update(E::cache_key(args).as_bytes());
    hex::encode(hasher.finalize())
  }

  fn keep_unused_for<E: Endpoint>(&self) -> Option<Duration> {
    self
      .ttl_overrides
      .get(E::NAME)
      .copied()
      .or_else(E::keep_unused_for)
  }

  /// Load an entry, evicting it if it outlived its time-to-live.
  fn live_entry<E: Endpoint>(&self, key: &str, now: DateTime<Utc>) -> Option<StoredEntry> {
    let entry = match self.storage.load(key) {
      Ok(entry) => entry?,
      Err(e) => {
        warn!(endpoint = E::NAME, error = %e, "Cache read failed");
        return None;
      }
    };

    let expired = self
      .keep_unused_for::<E>()
      .map(|ttl| now - entry.last_used > ttl)
      .unwrap_or(false);
    if expired {
      debug!(endpoint = E::NAME, "Cache entry expired");
      if let Err(e) = self.storage.remove(key) {
        warn!(endpoint = E::NAME, error = %e, "Failed to evict cache entry");
      }
      return None;
    }

    Some(entry)
  }

  /// Load a live entry and mark it used.
  fn lookup<E: Endpoint>(&self, key: &str, now: DateTime<Utc>) -> Option<StoredEntry> {
    let mut entry = self.live_entry::<E>(key, now)?;
    if let Err(e) = self.storage.touch(key, now) {
      warn!(endpoint = E::NAME, error = %e, "Failed to touch cache entry");
    }
    entry.last_used = now;
    Some(entry)
  }

  /// Read the cached value for an endpoint call, if any.
  pub fn get<E: Endpoint>(&self, args: &E::Args) -> Option<E::Value> {
    self.get_at::<E>(args, Utc::now())
  }

  pub(crate) fn get_at<E: Endpoint>(&self, args: &E::Args, now: DateTime<Utc>) -> Option<E::Value> {
    let entry = self.lookup::<E>(&Self::key_for::<E>(args), now)?;
    decode(entry.data)
  }

  /// Fetch through the cache.
  ///
  /// 1. If an entry exists and the endpoint does not ask for a refetch, serve it
  /// 2. Otherwise call the fetcher
  /// 3. Merge the result into the entry as it is now (or start a new one) and store it
  ///
  /// Fetch errors propagate unchanged and leave the entry as it was.
  pub async fn fetch<E, F, Fut>(
    &self,
    args: E::Args,
    fetcher: F,
  ) -> Result<CacheResult<E::Value>, ApiError>
  where
    E: Endpoint,
    F: FnOnce(E::Args) -> Fut,
    Fut: Future<Output = Result<E::Value, ApiError>>,
  {
    self.fetch_at::<E, F, Fut>(args, fetcher, Utc::now()).await
  }

  pub(crate) async fn fetch_at<E, F, Fut>(
    &self,
    args: E::Args,
    fetcher: F,
    now: DateTime<Utc>,
  ) -> Result<CacheResult<E::Value>, ApiError>
  where
    E: Endpoint,
    F: FnOnce(E::Args) -> Fut,
    Fut: Future<Output = Result<E::Value, ApiError>>,
  {
    let key = Self::key_for::<E>(&args);

    if let Some(entry) = self.lookup::<E>(&key, now) {
      let prev_args: Option<E::Args> = decode(entry.args);
      let data: Option<E::Value> = decode(entry.data);
      if let (Some(prev_args), Some(data)) = (prev_args, data) {
        if !E::should_refetch(&args, Some(&prev_args)) {
          debug!(endpoint = E::NAME, "Cache hit");
          return Ok(CacheResult::from_cache(data, entry.cached_at));
        }
      }
    }

    debug!(endpoint = E::NAME, "Cache refetch");
    let incoming = fetcher(args.clone()).await?;

    let merged = self.store_merged::<E>(&key, &args, incoming, now)?;
    Ok(CacheResult::from_network(merged))
  }

  /// Merge `incoming` into the current entry and write it back.
  ///
  /// The entry is re-read under the write lock, so fetches that finished
  /// while this one was in flight are kept.
  fn store_merged<E: Endpoint>(
    &self,
    key: &str,
    args: &E::Args,
    incoming: E::Value,
    now: DateTime<Utc>,
  ) -> Result<E::Value, ApiError> {
    let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

    let current: Option<E::Value> = self
      .live_entry::<E>(key, now)
      .and_then(|entry| decode(entry.data));
    let merged = match current {
      Some(mut data) => {
        E::merge(&mut data, incoming, args);
        data
      }
      None => incoming,
    };

    let entry = StoredEntry {
      endpoint: E::NAME.to_string(),
      data: serde_json::to_value(&merged)?,
      args: serde_json::to_value(args)?,
      cached_at: now,
      last_used: now,
    };
    if let Err(e) = self.storage.save(key, &entry) {
      warn!(endpoint = E::NAME, error = %e, "Cache write failed");
    }

    Ok(merged)
  }

  /// Drop the entry for an endpoint call.
  pub fn invalidate<E: Endpoint>(&self, args: &E::Args) {
    if let Err(e) = self.storage.remove(&Self::key_for::<E>(args)) {
      warn!(endpoint = E::NAME, error = %e, "Failed to invalidate cache entry");
    }
  }

  pub fn clear(&self) {
    if let Err(e) = self.storage.clear() {
      warn!(error = %e, "Failed to clear cache");
    }
  }

  pub fn len(&self) -> usize {
    self.storage.len().unwrap_or_else(|e| {
      warn!(error = %e, "Failed to count cache entries");
      0
    })
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for CacheLayer {
  fn default() -> Self {
    Self::in_memory()
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl_overrides: Arc::clone(&self.ttl_overrides),
      write_lock: Arc::clone(&self.write_lock),
    }
  }
}

/// Entries that no longer match their type are treated as missing.
fn decode<T: DeserializeOwned>(value: Value) -> Option<T> {
  serde_json::from_value(value).ok()
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::{merge_by_page, CacheSource};
  use crate::db::SqliteStore;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Args {
    page: u32,
    q: String,
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Rows {
    rows: Vec<u32>,
  }

  fn rows(r: &mut Rows) -> &mut Vec<u32> {
    &mut r.rows
  }

  struct Paged;

  impl Endpoint for Paged {
    const NAME: &'static str = "paged";
    type Args = Args;
    type Value = Rows;

    fn cache_key(_args: &Args) -> String {
      Self::NAME.to_string()
    }

    fn merge(cached: &mut Rows, incoming: Rows, args: &Args) {
      merge_by_page(cached, incoming, args.page, rows);
    }

    fn should_refetch(current: &Args, previous: Option<&Args>) -> bool {
      previous.map(|p| p.page != current.page).unwrap_or(true)
    }
  }

  struct Stats;

  impl Endpoint for Stats {
    const NAME: &'static str = "stats";
    type Args = String;
    type Value = u64;

    fn keep_unused_for() -> Option<Duration> {
      Some(Duration::seconds(300))
    }
  }

  fn args(page: u32, q: &str) -> Args {
    Args {
      page,
      q: q.to_string(),
    }
  }

  #[tokio::test]
  async fn test_pages_share_one_entry_and_append() {
    let cache = CacheLayer::in_memory();

    let first = cache
      .fetch::<Paged, _, _>(args(1, ""), |_| async { Ok(Rows { rows: vec![1, 2] }) })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .fetch::<Paged, _, _>(args(2, ""), |_| async { Ok(Rows { rows: vec![3] }) })
      .await
      .unwrap();
    assert_eq!(second.data.rows, vec![1, 2, 3]);
    assert_eq!(cache.len(), 1);

    // Back to page 1 replaces the accumulated list
    let refreshed = cache
      .fetch::<Paged, _, _>(args(1, ""), |_| async { Ok(Rows { rows: vec![7] }) })
      .await
      .unwrap();
    assert_eq!(refreshed.data.rows, vec![7]);
  }

  #[tokio::test]
  async fn test_same_page_is_served_from_cache() {
    let cache = CacheLayer::in_memory();
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
      cache
        .fetch::<Paged, _, _>(args(1, ""), |_| {
          calls.fetch_add(1, Ordering::SeqCst);
          async { Ok(Rows { rows: vec![1] }) }
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_non_page_filter_change_serves_stale_entry() {
    let cache = CacheLayer::in_memory();

    cache
      .fetch::<Paged, _, _>(args(1, "rust"), |_| async { Ok(Rows { rows: vec![1] }) })
      .await
      .unwrap();

    // Only `page` is compared, so a different filter still hits the entry
    let result = cache
      .fetch::<Paged, _, _>(args(1, "go"), |_| async { Ok(Rows { rows: vec![99] }) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data.rows, vec![1]);
  }

  #[tokio::test]
  async fn test_fetch_error_keeps_entry() {
    let cache = CacheLayer::in_memory();

    cache
      .fetch::<Paged, _, _>(args(1, ""), |_| async { Ok(Rows { rows: vec![1] }) })
      .await
      .unwrap();

    let err = cache
      .fetch::<Paged, _, _>(args(2, ""), |_| async {
        Err(ApiError::network("Network error"))
      })
      .await
      .unwrap_err();
    assert_eq!(err.message, "Network error");
    assert_eq!(cache.get::<Paged>(&args(1, "")), Some(Rows { rows: vec![1] }));
  }

  #[tokio::test]
  async fn test_unused_entry_expires() {
    let cache = CacheLayer::in_memory();
    let start = Utc::now();

    cache
      .fetch_at::<Stats, _, _>("u1".to_string(), |_| async { Ok(42) }, start)
      .await
      .unwrap();

    // Still alive just inside the window, and the read renews it
    let t1 = start + Duration::seconds(299);
    assert_eq!(cache.get_at::<Stats>(&"u1".to_string(), t1), Some(42));

    let t2 = t1 + Duration::seconds(301);
    assert_eq!(cache.get_at::<Stats>(&"u1".to_string(), t2), None);
    assert_eq!(cache.len(), 0);
  }

  #[tokio::test]
  async fn test_default_key_separates_args() {
    let cache = CacheLayer::in_memory();

    cache
      .fetch::<Stats, _, _>("u1".to_string(), |_| async { Ok(1) })
      .await
      .unwrap();
    cache
      .fetch::<Stats, _, _>("u2".to_string(), |_| async { Ok(2) })
      .await
      .unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get::<Stats>(&"u2".to_string()), Some(2));
  }

  #[tokio::test]
  async fn test_ttl_override() {
    let cache = CacheLayer::in_memory().with_keep_unused_for("stats", Duration::seconds(10));
    let start = Utc::now();

    cache
      .fetch_at::<Stats, _, _>("u1".to_string(), |_| async { Ok(7) }, start)
      .await
      .unwrap();

    let later = start + Duration::seconds(11);
    assert_eq!(cache.get_at::<Stats>(&"u1".to_string(), later), None);
  }

  #[tokio::test]
  async fn test_overlapping_page_fetches_keep_both_pages() {
    let cache = CacheLayer::in_memory();
    cache
      .fetch::<Paged, _, _>(args(1, ""), |_| async { Ok(Rows { rows: vec![1] }) })
      .await
      .unwrap();

    // Both fetches read the entry before either writes back
    let (second, third) = tokio::join!(
      cache.fetch::<Paged, _, _>(args(2, ""), |_| async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(Rows { rows: vec![2] })
      }),
      cache.fetch::<Paged, _, _>(args(3, ""), |_| async {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        Ok(Rows { rows: vec![3] })
      }),
    );
    assert_eq!(second.unwrap().data.rows, vec![1, 2]);
    assert_eq!(third.unwrap().data.rows, vec![1, 2, 3]);

    // Stored args are those of the last write
    let cached = cache.get::<Paged>(&args(3, "")).unwrap();
    assert_eq!(cached.rows, vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_sqlite_entries_expire_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");
    let open = || CacheLayer::new(Arc::new(SqliteStore::open_at(&path).unwrap()));
    let start = Utc::now();
    let key = "u1".to_string();

    open()
      .fetch_at::<Stats, _, _>(key.clone(), |_| async { Ok(42) }, start)
      .await
      .unwrap();

    // A later process reads it and renews it
    let t1 = start + Duration::seconds(200);
    assert_eq!(open().get_at::<Stats>(&key, t1), Some(42));

    // 250 s since the last read, still alive
    let t2 = t1 + Duration::seconds(250);
    let result = open()
      .fetch_at::<Stats, _, _>(key.clone(), |_| async { Ok(0) }, t2)
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data, 42);

    let t3 = t2 + Duration::seconds(301);
    let cache = open();
    assert_eq!(cache.get_at::<Stats>(&key, t3), None);
    assert!(cache.is_empty());
  }
}
