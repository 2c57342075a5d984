//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::SqliteStore;

/// One cached endpoint value as it sits in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
  /// Endpoint that wrote the entry
  pub endpoint: String,
  pub data: Value,
  /// Args of the call that last wrote this entry
  pub args: Value,
  pub cached_at: DateTime<Utc>,
  pub last_used: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Keys are the hashed endpoint keys built by `CacheLayer`.
pub trait CacheStorage: Send + Sync {
  fn load(&self, key: &str) -> Result<Option<StoredEntry>>;

  /// Insert or replace an entry.
  fn save(&self, key: &str, entry: &StoredEntry) -> Result<()>;

  /// Record a read so time-to-live counts from now.
  fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;

  fn clear(&self) -> Result<()>;

  fn len(&self) -> Result<usize>;
}

/// Storage that lives as long as the process.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredEntry>>> {
    self.entries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
    Ok(self.entries()?.get(key).cloned())
  }

  fn save(&self, key: &str, entry: &StoredEntry) -> Result<()> {
    self.entries()?.insert(key.to_string(), entry.clone());
    Ok(())
  }

  fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
    if let Some(entry) = self.entries()?.get_mut(key) {
      entry.last_used = at;
    }
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries()?.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self.entries()?.clear();
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    Ok(self.entries()?.len())
  }
}

/// Cache entries share the state database with the key-value table.
impl CacheStorage for SqliteStore {
  fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self.conn()?;

    let row: Option<(String, String, String, String, String)> = conn
      .query_row(
        "SELECT endpoint, data, args, cached_at, last_used FROM cache_entries
         WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    let Some((endpoint, data, args, cached_at, last_used)) = row else {
      return Ok(None);
    };

    Ok(Some(StoredEntry {
      endpoint,
      data: serde_json::from_str(&data)
        .map_err(|e| eyre!("Failed to deserialize cache entry: {}", e))?,
      args: serde_json::from_str(&args)
        .map_err(|e| eyre!("Failed to deserialize cache args: {}", e))?,
      cached_at: parse_datetime(&cached_at)?,
      last_used: parse_datetime(&last_used)?,
    }))
  }

  fn save(&self, key: &str, entry: &StoredEntry) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries
           (cache_key, endpoint, data, args, cached_at, last_used)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
          key,
          entry.endpoint,
          entry.data.to_string(),
          entry.args.to_string(),
          entry.cached_at.to_rfc3339(),
          entry.last_used.to_rfc3339(),
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute(
        "UPDATE cache_entries SET last_used = ? WHERE cache_key = ?",
        params![at.to_rfc3339(), key],
      )
      .map_err(|e| eyre!("Failed to touch cache entry: {}", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute("DELETE FROM cache_entries WHERE cache_key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let conn = self.conn()?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count as usize)
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use serde_json::json;

  fn entry(at: DateTime<Utc>) -> StoredEntry {
    StoredEntry {
      endpoint: "userStats".to_string(),
      data: json!({ "followers": 3 }),
      args: json!("u1"),
      cached_at: at,
      last_used: at,
    }
  }

  #[test]
  fn test_sqlite_entry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");
    let at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
      .unwrap()
      .with_timezone(&Utc);

    {
      let store = SqliteStore::open_at(&path).unwrap();
      assert_eq!(store.load("k").unwrap(), None);
      store.save("k", &entry(at)).unwrap();
      store.touch("k", at + Duration::seconds(30)).unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    let loaded = store.load("k").unwrap().unwrap();
    assert_eq!(loaded.data, json!({ "followers": 3 }));
    assert_eq!(loaded.args, json!("u1"));
    assert_eq!(loaded.cached_at, at);
    assert_eq!(loaded.last_used, at + Duration::seconds(30));
    assert_eq!(store.len().unwrap(), 1);

    store.remove("k").unwrap();
    assert_eq!(store.len().unwrap(), 0);
  }

  #[test]
  fn test_memory_storage_clear() {
    let storage = MemoryStorage::new();
    let now = Utc::now();
    storage.save("a", &entry(now)).unwrap();
    storage.save("b", &entry(now)).unwrap();
    assert_eq!(storage.len().unwrap(), 2);

    storage.clear().unwrap();
    assert_eq!(storage.load("a").unwrap(), None);
  }
}
