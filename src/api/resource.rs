use serde::{Deserialize, Serialize};

/// Paginated list endpoints exposed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
  Notifications,
  /// Users recommended through mutual connections
  MutualConnections,
  /// Users recommended through shared study groups
  SharedGroups,
  JoinedGroups,
  RecommendedGroups,
  Friends { user_id: String },
  Followers { user_id: String },
  Followings { user_id: String },
}

impl Resource {
  /// Path relative to the API base URL.
  pub fn path(&self) -> String {
    match self {
      Self::Notifications => "notifications".to_string(),
      Self::MutualConnections => "users/recommendations/mutual-connections".to_string(),
      Self::SharedGroups => "users/recommendations/shared-groups".to_string(),
      Self::JoinedGroups => "study-groups/joined".to_string(),
      Self::RecommendedGroups => "study-groups/recommended".to_string(),
      Self::Friends { user_id } => format!("users/{}/friends", user_id),
      Self::Followers { user_id } => format!("users/{}/followers", user_id),
      Self::Followings { user_id } => format!("users/{}/followings", user_id),
    }
  }

  /// Name of the array inside `result` that carries the items.
  pub fn list_field(&self) -> &'static str {
    match self {
      Self::Notifications => "notifications",
      Self::MutualConnections | Self::SharedGroups => "users",
      Self::JoinedGroups | Self::RecommendedGroups => "studyGroups",
      Self::Friends { .. } => "friends",
      Self::Followers { .. } => "followers",
      Self::Followings { .. } => "followings",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Notifications => "notifications",
      Self::MutualConnections => "mutual connections",
      Self::SharedGroups => "shared groups",
      Self::JoinedGroups => "joined groups",
      Self::RecommendedGroups => "recommended groups",
      Self::Friends { .. } => "friends",
      Self::Followers { .. } => "followers",
      Self::Followings { .. } => "followings",
    }
  }
}

/// Query parameters for one list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
  pub page: u32,
  pub limit: u32,
  /// Extra `key=value` filters, sent in order
  #[serde(default)]
  pub filters: Vec<(String, String)>,
}

impl ListParams {
  pub fn new(page: u32, limit: u32) -> Self {
    Self {
      page,
      limit,
      filters: Vec::new(),
    }
  }

  pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
    self.filters = filters;
    self
  }

  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![
      ("page".to_string(), self.page.to_string()),
      ("limit".to_string(), self.limit.to_string()),
    ];
    pairs.extend(self.filters.iter().cloned());
    pairs
  }
}
