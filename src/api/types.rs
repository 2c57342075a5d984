use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Followable, ListItem};

/// One server-returned batch of items plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page_number: u32,
  pub page_size: u32,
  pub total_items: u64,
  pub total_pages: u32,
}

/// Minimal reference to another user, embedded in notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
  pub id: String,
  pub name: String,
  pub avatar: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  Follow,
  Like,
  Comment,
  GroupInvite,
  GroupJoinRequest,
  Other,
}

impl NotificationKind {
  pub fn parse(s: &str) -> Self {
    match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
      "follow" => Self::Follow,
      "like" => Self::Like,
      "comment" => Self::Comment,
      "group_invite" => Self::GroupInvite,
      "group_join_request" | "join_request" => Self::GroupJoinRequest,
      _ => Self::Other,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub id: String,
  pub kind: NotificationKind,
  pub message: String,
  pub actor: Option<UserRef>,
  pub is_read: bool,
  pub created_at: Option<DateTime<Utc>>,
}

/// User suggested by the community recommendation lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityUser {
  pub id: String,
  pub name: String,
  pub username: Option<String>,
  pub avatar: String,
  pub is_follow: bool,
  pub mutual_connections: u32,
  pub shared_groups: u32,
}

/// Entry in a friends / followers / followings list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationUser {
  pub id: String,
  pub name: String,
  pub username: Option<String>,
  pub avatar: String,
  pub is_follow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyGroup {
  pub id: String,
  pub name: String,
  pub avatar: String,
  pub description: Option<String>,
  pub member_count: u32,
  pub is_member: bool,
}

/// Profile of the signed-in user, persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id: String,
  pub name: String,
  pub username: Option<String>,
  pub email: Option<String>,
  pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
  pub user_id: String,
  pub followers: u64,
  pub followings: u64,
  pub friends: u64,
  pub study_groups: u64,
  pub posts: u64,
}

impl ListItem for Notification {
  fn item_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "notification"
  }
}

impl ListItem for CommunityUser {
  fn item_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "community_user"
  }
}

impl Followable for CommunityUser {
  fn set_following(&mut self, is_following: bool) {
    self.is_follow = is_following;
  }
}

impl ListItem for RelationUser {
  fn item_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "relation_user"
  }
}

impl Followable for RelationUser {
  fn set_following(&mut self, is_following: bool) {
    self.is_follow = is_following;
  }
}

impl ListItem for StudyGroup {
  fn item_id(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "study_group"
  }
}
