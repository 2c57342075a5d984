//! Serde-deserializable types matching the service's JSON responses.
//!
//! These types are separate from domain types: every field the server may
//! omit is optional here, and the `TryFrom` conversions below are the single
//! place where required fields are checked.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;
use super::types::{
  CommunityUser, Notification, NotificationKind, Page, RelationUser, StudyGroup, UserProfile,
  UserRef, UserStats,
};

/// Avatar used when the server omits one.
pub const DEFAULT_AVATAR: &str = "";

// ============================================================================
// Envelopes
// ============================================================================

/// `{ message, result? }` wrapper around every response
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<R> {
  #[serde(default)]
  pub message: String,
  pub result: Option<R>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPagination {
  #[serde(default)]
  pub total: u64,
  #[serde(default = "one")]
  pub page: u32,
  #[serde(default = "one")]
  pub limit: u32,
  #[serde(default)]
  pub total_pages: u32,
}

fn one() -> u32 {
  1
}

/// Parse a list envelope, pulling items out of `result.<list_field>`.
pub fn parse_list_page<R, T>(body: &str, list_field: &str) -> Result<Page<T>, ApiError>
where
  R: DeserializeOwned,
  T: TryFrom<R, Error = ApiError>,
{
  let envelope: ApiEnvelope<Map<String, Value>> = serde_json::from_str(body)?;
  let mut result = envelope
    .result
    .ok_or_else(|| ApiError::decode("Response is missing `result`"))?;

  let raw_items = result
    .remove(list_field)
    .ok_or_else(|| ApiError::decode(format!("Response is missing `result.{}`", list_field)))?;
  let raw_items: Vec<R> = serde_json::from_value(raw_items)?;

  let pagination: ApiPagination = match result.remove("pagination") {
    Some(p) => serde_json::from_value(p)?,
    None => ApiPagination::default(),
  };

  let items = raw_items
    .into_iter()
    .map(T::try_from)
    .collect::<Result<Vec<T>, ApiError>>()?;

  Ok(Page {
    items,
    page_number: pagination.page.max(1),
    page_size: pagination.limit.max(1),
    total_items: pagination.total,
    total_pages: pagination.total_pages,
  })
}

/// Parse an action envelope into its `result`, if any.
pub fn parse_action<R: DeserializeOwned>(body: &str) -> Result<ApiEnvelope<R>, ApiError> {
  Ok(serde_json::from_str(body)?)
}

fn required(value: Option<String>, entity: &str, field: &str) -> Result<String, ApiError> {
  value
    .filter(|v| !v.trim().is_empty())
    .ok_or_else(|| ApiError::decode(format!("{} is missing required field `{}`", entity, field)))
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
  #[serde(alias = "_id")]
  pub id: Option<String>,
  pub name: Option<String>,
  pub username: Option<String>,
  pub email: Option<String>,
  pub avatar: Option<String>,
  #[serde(default)]
  pub is_follow: bool,
  #[serde(default, alias = "mutualFriendsCount")]
  pub mutual_connections: u32,
  #[serde(default, alias = "sharedGroupsCount")]
  pub shared_groups: u32,
}

impl TryFrom<ApiUser> for CommunityUser {
  type Error = ApiError;

  fn try_from(u: ApiUser) -> Result<Self, ApiError> {
    Ok(Self {
      id: required(u.id, "user", "id")?,
      name: required(u.name, "user", "name")?,
      username: u.username,
      avatar: u.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
      is_follow: u.is_follow,
      mutual_connections: u.mutual_connections,
      shared_groups: u.shared_groups,
    })
  }
}

impl TryFrom<ApiUser> for RelationUser {
  type Error = ApiError;

  fn try_from(u: ApiUser) -> Result<Self, ApiError> {
    Ok(Self {
      id: required(u.id, "user", "id")?,
      name: required(u.name, "user", "name")?,
      username: u.username,
      avatar: u.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
      is_follow: u.is_follow,
    })
  }
}

impl TryFrom<ApiUser> for UserProfile {
  type Error = ApiError;

  fn try_from(u: ApiUser) -> Result<Self, ApiError> {
    Ok(Self {
      id: required(u.id, "profile", "id")?,
      name: required(u.name, "profile", "name")?,
      username: u.username,
      email: u.email,
      avatar: u.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
    })
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUserStats {
  #[serde(default)]
  pub followers: u64,
  #[serde(default)]
  pub followings: u64,
  #[serde(default)]
  pub friends: u64,
  #[serde(default)]
  pub study_groups: u64,
  #[serde(default)]
  pub posts: u64,
}

impl ApiUserStats {
  pub fn into_stats(self, user_id: &str) -> UserStats {
    UserStats {
      user_id: user_id.to_string(),
      followers: self.followers,
      followings: self.followings,
      friends: self.friends,
      study_groups: self.study_groups,
      posts: self.posts,
    }
  }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiActor {
  #[serde(alias = "_id")]
  pub id: Option<String>,
  pub name: Option<String>,
  pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNotification {
  #[serde(alias = "_id")]
  pub id: Option<String>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  #[serde(alias = "content")]
  pub message: Option<String>,
  #[serde(alias = "sender")]
  pub actor: Option<ApiActor>,
  #[serde(default)]
  pub is_read: bool,
  pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApiNotification> for Notification {
  type Error = ApiError;

  fn try_from(n: ApiNotification) -> Result<Self, ApiError> {
    // An actor without id or name is dropped rather than failing the whole page
    let actor = n.actor.and_then(|a| match (a.id, a.name) {
      (Some(id), Some(name)) => Some(UserRef {
        id,
        name,
        avatar: a.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
      }),
      _ => None,
    });

    Ok(Self {
      id: required(n.id, "notification", "id")?,
      kind: n
        .kind
        .as_deref()
        .map(NotificationKind::parse)
        .unwrap_or(NotificationKind::Other),
      message: n.message.unwrap_or_default(),
      actor,
      is_read: n.is_read,
      created_at: n.created_at,
    })
  }
}

// ============================================================================
// Study groups
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStudyGroup {
  #[serde(alias = "_id")]
  pub id: Option<String>,
  pub name: Option<String>,
  #[serde(alias = "thumbnail")]
  pub avatar: Option<String>,
  pub description: Option<String>,
  #[serde(default, alias = "membersCount")]
  pub member_count: u32,
  #[serde(default, alias = "isJoined")]
  pub is_member: bool,
}

impl TryFrom<ApiStudyGroup> for StudyGroup {
  type Error = ApiError;

  fn try_from(g: ApiStudyGroup) -> Result<Self, ApiError> {
    Ok(Self {
      id: required(g.id, "study group", "id")?,
      name: required(g.name, "study group", "name")?,
      avatar: g.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
      description: g.description,
      member_count: g.member_count,
      is_member: g.is_member,
    })
  }
}
