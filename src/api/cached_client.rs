//! API client wrapped with the keyed request cache.

use chrono::Duration;
use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult, CacheStorage, Endpoint};
use crate::store::SocialBackend;

use super::cache::{JoinedStudyGroups, RecommendedStudyGroups, StudyGroupList, UserStatsLookup};
use super::error::ApiError;
use super::resource::{ListParams, Resource};
use super::types::UserStats;

/// Which study-group listing to browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupListing {
  Joined,
  Recommended,
}

/// API client with transparent caching for study groups and user stats.
///
/// Study-group listings accumulate pages in one cache entry per listing;
/// stats are cached per user and expire when left unused. Entries live in
/// `storage`, so with SQLite they outlast the process.
#[derive(Clone)]
pub struct CachedApiClient {
  backend: Arc<dyn SocialBackend>,
  cache: CacheLayer,
}

impl CachedApiClient {
  pub fn new(
    backend: Arc<dyn SocialBackend>,
    storage: Arc<dyn CacheStorage>,
    user_stats_ttl: Duration,
  ) -> Self {
    let cache =
      CacheLayer::new(storage).with_keep_unused_for(UserStatsLookup::NAME, user_stats_ttl);
    Self { backend, cache }
  }

  /// Fetch one page of a listing and return everything accumulated so far.
  pub async fn study_groups(
    &self,
    listing: GroupListing,
    params: ListParams,
  ) -> Result<CacheResult<StudyGroupList>, ApiError> {
    match listing {
      GroupListing::Joined => {
        self
          .listing::<JoinedStudyGroups>(Resource::JoinedGroups, params)
          .await
      }
      GroupListing::Recommended => {
        self
          .listing::<RecommendedStudyGroups>(Resource::RecommendedGroups, params)
          .await
      }
    }
  }

  async fn listing<E>(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> Result<CacheResult<StudyGroupList>, ApiError>
  where
    E: Endpoint<Args = ListParams, Value = StudyGroupList>,
  {
    self
      .cache
      .fetch::<E, _, _>(params, |params| {
        let request = self.backend.study_groups(resource, params);
        async move { request.await.map(StudyGroupList::from) }
      })
      .await
  }

  pub async fn user_stats(&self, user_id: &str) -> Result<CacheResult<UserStats>, ApiError> {
    self
      .cache
      .fetch::<UserStatsLookup, _, _>(user_id.to_string(), |user_id| {
        self.backend.user_stats(user_id)
      })
      .await
  }

  /// Drop a listing so the next call starts from the network.
  pub fn invalidate_groups(&self, listing: GroupListing) {
    // List keys ignore params, any value addresses the entry
    let any = ListParams::new(1, 1);
    match listing {
      GroupListing::Joined => self.cache.invalidate::<JoinedStudyGroups>(&any),
      GroupListing::Recommended => self.cache.invalidate::<RecommendedStudyGroups>(&any),
    }
  }

  pub fn clear(&self) {
    self.cache.clear();
  }
}
