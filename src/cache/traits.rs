//! Core traits and types for the request cache.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// A logical API endpoint whose results can be cached.
///
/// The endpoint decides how its cache key is derived, how a freshly fetched
/// value combines with the cached one, and when a call must go to the network
/// even though an entry exists.
pub trait Endpoint {
  /// Logical endpoint name, the basis of every cache key
  const NAME: &'static str;

  type Args: Clone + Serialize + DeserializeOwned + Send + Sync;
  type Value: Clone + Serialize + DeserializeOwned + Send + Sync;

  /// Key material for an entry. Defaults to name plus serialized args, so
  /// each distinct argument set gets its own entry.
  fn cache_key(args: &Self::Args) -> String {
    format!(
      "{}({})",
      Self::NAME,
      serde_json::to_string(args).unwrap_or_default()
    )
  }

  /// Combine an incoming value with the cached one. Defaults to replace.
  fn merge(cached: &mut Self::Value, incoming: Self::Value, _args: &Self::Args) {
    *cached = incoming;
  }

  /// Whether a cached entry must be refreshed for `current` args, given the
  /// args of the call that produced it.
  fn should_refetch(_current: &Self::Args, previous: Option<&Self::Args>) -> bool {
    previous.is_none()
  }

  /// How long an entry survives without being read. `None` keeps it until
  /// invalidated.
  fn keep_unused_for() -> Option<Duration> {
    None
  }
}

/// Merge rule for page-numbered list values: page 1 replaces, any other page
/// appends its items to the designated list field.
pub fn merge_by_page<V, T, F>(cached: &mut V, mut incoming: V, page: u32, mut list_field: F)
where
  F: FnMut(&mut V) -> &mut Vec<T>,
{
  if page <= 1 {
    *cached = incoming;
    return;
  }

  let new_items = std::mem::take(list_field(&mut incoming));
  list_field(cached).extend(new_items);
  // Pagination and any other metadata come from the latest response
  let merged_items = std::mem::take(list_field(cached));
  *cached = incoming;
  *list_field(cached) = merged_items;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the served entry was written (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network, merged into the cache
  Network,
  /// Served from an existing entry without a request
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Listing {
    rows: Vec<u32>,
    total_pages: u32,
  }

  fn rows(l: &mut Listing) -> &mut Vec<u32> {
    &mut l.rows
  }

  #[test]
  fn test_merge_first_page_replaces() {
    let mut cached = Listing {
      rows: vec![1, 2, 3, 4],
      total_pages: 2,
    };
    let incoming = Listing {
      rows: vec![9],
      total_pages: 5,
    };
    merge_by_page(&mut cached, incoming.clone(), 1, rows);
    assert_eq!(cached, incoming);
  }

  #[test]
  fn test_merge_later_page_appends_and_takes_metadata() {
    let mut cached = Listing {
      rows: vec![1, 2],
      total_pages: 2,
    };
    let incoming = Listing {
      rows: vec![3, 2],
      total_pages: 3,
    };
    merge_by_page(&mut cached, incoming, 2, rows);
    assert_eq!(cached.rows, vec![1, 2, 3, 2]);
    assert_eq!(cached.total_pages, 3);
  }
}
