//! Cache endpoint definitions for service types.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cache::{merge_by_page, Endpoint};

use super::api_types::ApiPagination;
use super::resource::ListParams;
use super::types::{Page, StudyGroup, UserStats};

/// Default time-to-live of unused user-stats entries.
pub const USER_STATS_KEEP_UNUSED_SECS: i64 = 300;

/// Accumulated study-group listing, as held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroupList {
  pub study_groups: Vec<StudyGroup>,
  pub pagination: ApiPagination,
}

impl StudyGroupList {
  pub fn has_more(&self) -> bool {
    self.pagination.page < self.pagination.total_pages
  }
}

impl From<Page<StudyGroup>> for StudyGroupList {
  fn from(page: Page<StudyGroup>) -> Self {
    Self {
      pagination: ApiPagination {
        total: page.total_items,
        page: page.page_number,
        limit: page.page_size,
        total_pages: page.total_pages,
      },
      study_groups: page.items,
    }
  }
}

fn study_groups(list: &mut StudyGroupList) -> &mut Vec<StudyGroup> {
  &mut list.study_groups
}

// ============================================================================
// Endpoints
// ============================================================================

// Paginated endpoints share one entry per endpoint regardless of arguments,
// and only a change of `page` forces a network call. Other filters are not
// compared, so a filter change alone can serve the previous listing.

pub struct JoinedStudyGroups;

impl Endpoint for JoinedStudyGroups {
  const NAME: &'static str = "joinedStudyGroups";
  type Args = ListParams;
  type Value = StudyGroupList;

  fn cache_key(_args: &ListParams) -> String {
    Self::NAME.to_string()
  }

  fn merge(cached: &mut StudyGroupList, incoming: StudyGroupList, args: &ListParams) {
    merge_by_page(cached, incoming, args.page, study_groups);
  }

  fn should_refetch(current: &ListParams, previous: Option<&ListParams>) -> bool {
    page_changed(current, previous)
  }
}

pub struct RecommendedStudyGroups;

impl Endpoint for RecommendedStudyGroups {
  const NAME: &'static str = "recommendedStudyGroups";
  type Args = ListParams;
  type Value = StudyGroupList;

  fn cache_key(_args: &ListParams) -> String {
    Self::NAME.to_string()
  }

  fn merge(cached: &mut StudyGroupList, incoming: StudyGroupList, args: &ListParams) {
    merge_by_page(cached, incoming, args.page, study_groups);
  }

  fn should_refetch(current: &ListParams, previous: Option<&ListParams>) -> bool {
    page_changed(current, previous)
  }
}

/// Per-user stats, keyed by user id and dropped after a spell of disuse.
pub struct UserStatsLookup;

impl Endpoint for UserStatsLookup {
  const NAME: &'static str = "userStats";
  type Args = String;
  type Value = UserStats;

  fn keep_unused_for() -> Option<Duration> {
    Some(Duration::seconds(USER_STATS_KEEP_UNUSED_SECS))
  }
}

fn page_changed(current: &ListParams, previous: Option<&ListParams>) -> bool {
  previous.map(|p| p.page != current.page).unwrap_or(true)
}
