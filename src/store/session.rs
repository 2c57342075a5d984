use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::UserProfile;
use crate::db::KeyValueStore;

/// Storage key of the signed-in user's profile.
pub const SESSION_KEY: &str = "studyhub.session.user";

/// Signed-in user, mirrored to local storage.
pub struct Session {
  storage: Arc<dyn KeyValueStore>,
  profile: Option<UserProfile>,
}

impl Session {
  /// Rehydrate from storage. A missing key means nobody is signed in.
  pub fn hydrate(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
    let profile = match storage.get(SESSION_KEY)? {
      Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
        Ok(profile) => Some(profile),
        Err(e) => {
          // Unreadable entries are dropped so they don't fail every startup
          warn!(error = %e, "Discarding unreadable session profile");
          storage.remove(SESSION_KEY)?;
          None
        }
      },
      None => None,
    };

    Ok(Self { storage, profile })
  }

  pub fn profile(&self) -> Option<&UserProfile> {
    self.profile.as_ref()
  }

  pub fn user_id(&self) -> Option<&str> {
    self.profile.as_ref().map(|p| p.id.as_str())
  }

  pub fn set_profile(&mut self, profile: UserProfile) -> Result<()> {
    let raw =
      serde_json::to_string(&profile).map_err(|e| eyre!("Failed to serialize profile: {}", e))?;
    self.storage.set(SESSION_KEY, &raw)?;
    info!(user_id = %profile.id, "Session profile stored");
    self.profile = Some(profile);
    Ok(())
  }

  /// Forget the signed-in user, in memory and on disk.
  pub fn clear(&mut self) -> Result<()> {
    self.storage.remove(SESSION_KEY)?;
    self.profile = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::{MemoryStore, SqliteStore};

  fn profile() -> UserProfile {
    UserProfile {
      id: "u1".to_string(),
      name: "Ana".to_string(),
      username: Some("ana".to_string()),
      email: None,
      avatar: String::new(),
    }
  }

  #[test]
  fn test_absent_key_yields_no_profile() {
    let session = Session::hydrate(Arc::new(MemoryStore::new())).unwrap();
    assert!(session.profile().is_none());
  }

  #[test]
  fn test_profile_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
      let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_at(&path).unwrap());
      let mut session = Session::hydrate(storage).unwrap();
      session.set_profile(profile()).unwrap();
    }

    let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_at(&path).unwrap());
    let mut session = Session::hydrate(storage.clone()).unwrap();
    assert_eq!(session.profile(), Some(&profile()));
    assert_eq!(session.user_id(), Some("u1"));

    session.clear().unwrap();
    assert!(session.profile().is_none());
    assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
  }

  #[test]
  fn test_corrupt_entry_is_discarded() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    storage.set(SESSION_KEY, "{not json").unwrap();

    let session = Session::hydrate(storage.clone()).unwrap();
    assert!(session.profile().is_none());
    assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
  }
}
