//! Client for the study-group service REST API.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod resource;
pub mod types;

pub use cache::StudyGroupList;
pub use cached_client::{CachedApiClient, GroupListing};
pub use client::ApiClient;
pub use error::{ApiError, ErrorKind};
pub use resource::{ListParams, Resource};
pub use types::{
  CommunityUser, Notification, NotificationKind, Page, RelationUser, StudyGroup, UserProfile,
  UserRef, UserStats,
};
