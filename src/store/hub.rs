//! Every list store the client keeps, wired to its endpoint.

use color_eyre::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::info;

use super::follow::{fan_out, FollowTarget};
use super::list_state::ErrorPolicy;
use super::paginated::PaginatedStore;
use super::session::Session;
use crate::api::{
  ApiError, CommunityUser, ListParams, Notification, Page, RelationUser, Resource, StudyGroup,
  UserStats,
};

pub type BackendFuture<T> = BoxFuture<'static, Result<T, ApiError>>;

/// Remote operations the stores and the cached client depend on.
///
/// Futures are `'static` so stores can spawn them.
pub trait SocialBackend: Send + Sync + 'static {
  fn notifications(&self, params: ListParams) -> BackendFuture<Page<Notification>>;

  fn community_users(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> BackendFuture<Page<CommunityUser>>;

  fn relation_users(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> BackendFuture<Page<RelationUser>>;

  fn study_groups(&self, resource: Resource, params: ListParams) -> BackendFuture<Page<StudyGroup>>;

  fn follow(&self, user_id: String) -> BackendFuture<String>;

  fn unfollow(&self, user_id: String) -> BackendFuture<String>;

  fn mark_notification_read(&self, id: String) -> BackendFuture<String>;

  fn mark_all_notifications_read(&self) -> BackendFuture<String>;

  fn user_stats(&self, user_id: String) -> BackendFuture<UserStats>;
}

/// Friends, followers and followings of one user.
pub struct Relations {
  pub user_id: String,
  pub friends: PaginatedStore<RelationUser>,
  pub followers: PaginatedStore<RelationUser>,
  pub followings: PaginatedStore<RelationUser>,
}

impl Relations {
  fn reset(&mut self) {
    self.friends.reset();
    self.followers.reset();
    self.followings.reset();
  }

  fn poll(&mut self) -> bool {
    // Non-short-circuiting so every store gets polled
    self.friends.poll() | self.followers.poll() | self.followings.poll()
  }
}

pub struct Hub {
  backend: Arc<dyn SocialBackend>,
  page_size: u32,
  session: Session,
  pub notifications: PaginatedStore<Notification>,
  pub mutual_connections: PaginatedStore<CommunityUser>,
  pub shared_groups: PaginatedStore<CommunityUser>,
  pub joined_groups: PaginatedStore<StudyGroup>,
  pub recommended_groups: PaginatedStore<StudyGroup>,
  relations: Option<Relations>,
}

impl Hub {
  pub fn new(backend: Arc<dyn SocialBackend>, session: Session, page_size: u32) -> Self {
    Self {
      notifications: notification_store(&backend, page_size),
      mutual_connections: community_store(&backend, Resource::MutualConnections, page_size),
      shared_groups: community_store(&backend, Resource::SharedGroups, page_size),
      joined_groups: group_store(&backend, Resource::JoinedGroups, page_size),
      recommended_groups: group_store(&backend, Resource::RecommendedGroups, page_size),
      relations: None,
      backend,
      page_size,
      session,
    }
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn session_mut(&mut self) -> &mut Session {
    &mut self.session
  }

  /// Relationship lists for `user_id`, replacing those of any other user.
  pub fn view_relations(&mut self, user_id: &str) -> &mut Relations {
    let relations = match self.relations.take() {
      Some(current) if current.user_id == user_id => current,
      _ => self.relations_for(user_id),
    };
    self.relations.insert(relations)
  }

  fn relations_for(&self, user_id: &str) -> Relations {
    let user_id = user_id.to_string();
    Relations {
      friends: relation_store(
        &self.backend,
        Resource::Friends {
          user_id: user_id.clone(),
        },
        self.page_size,
      ),
      followers: relation_store(
        &self.backend,
        Resource::Followers {
          user_id: user_id.clone(),
        },
        self.page_size,
      ),
      followings: relation_store(
        &self.backend,
        Resource::Followings {
          user_id: user_id.clone(),
        },
        self.page_size,
      ),
      user_id,
    }
  }

  pub fn relations(&self) -> Option<&Relations> {
    self.relations.as_ref()
  }

  /// Patch a confirmed follow-status change into every user-shaped list.
  pub fn on_follow_status_changed(&mut self, user_id: &str, is_following: bool) -> usize {
    let mut targets: Vec<&mut dyn FollowTarget> =
      vec![&mut self.mutual_connections, &mut self.shared_groups];
    if let Some(relations) = self.relations.as_mut() {
      targets.push(&mut relations.friends);
      targets.push(&mut relations.followers);
      targets.push(&mut relations.followings);
    }
    fan_out(&mut targets, user_id, is_following)
  }

  /// Follow a user. Lists are only patched once the server has agreed.
  pub async fn follow_user(&mut self, user_id: &str) -> Result<usize, ApiError> {
    self.backend.follow(user_id.to_string()).await?;
    info!(user_id, "Followed user");
    Ok(self.on_follow_status_changed(user_id, true))
  }

  pub async fn unfollow_user(&mut self, user_id: &str) -> Result<usize, ApiError> {
    self.backend.unfollow(user_id.to_string()).await?;
    info!(user_id, "Unfollowed user");
    Ok(self.on_follow_status_changed(user_id, false))
  }

  /// Mark one notification read on the server, then locally.
  ///
  /// Returns whether the notification was loaded.
  pub async fn mark_notification_read(&mut self, id: &str) -> Result<bool, ApiError> {
    self.backend.mark_notification_read(id.to_string()).await?;
    Ok(self.notifications.apply_patch(id, |n| n.is_read = true))
  }

  /// Mark everything read. Returns how many loaded notifications changed.
  pub async fn mark_all_notifications_read(&mut self) -> Result<usize, ApiError> {
    self.backend.mark_all_notifications_read().await?;

    let unread: Vec<String> = self
      .notifications
      .items()
      .iter()
      .filter(|n| !n.is_read)
      .map(|n| n.id.clone())
      .collect();
    for id in &unread {
      self.notifications.apply_patch(id, |n| n.is_read = true);
    }
    Ok(unread.len())
  }

  /// Unread notifications among those loaded.
  pub fn unread_notifications(&self) -> usize {
    self
      .notifications
      .items()
      .iter()
      .filter(|n| !n.is_read)
      .count()
  }

  /// Apply every finished request. Returns `true` if any store changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = self.notifications.poll();
    changed |= self.mutual_connections.poll();
    changed |= self.shared_groups.poll();
    changed |= self.joined_groups.poll();
    changed |= self.recommended_groups.poll();
    if let Some(relations) = self.relations.as_mut() {
      changed |= relations.poll();
    }
    changed
  }

  /// Return every store to its initial state.
  pub fn reset_all(&mut self) {
    self.notifications.reset();
    self.mutual_connections.reset();
    self.shared_groups.reset();
    self.joined_groups.reset();
    self.recommended_groups.reset();
    if let Some(relations) = self.relations.as_mut() {
      relations.reset();
    }
  }

  /// Tear down the session: forget the profile and everything loaded for it.
  pub fn sign_out(&mut self) -> Result<()> {
    self.session.clear()?;
    self.reset_all();
    self.relations = None;
    info!("Signed out");
    Ok(())
  }
}

fn notification_store(
  backend: &Arc<dyn SocialBackend>,
  page_size: u32,
) -> PaginatedStore<Notification> {
  let backend = Arc::clone(backend);
  PaginatedStore::new("notifications", page_size, move |params| {
    backend.notifications(params)
  })
}

fn community_store(
  backend: &Arc<dyn SocialBackend>,
  resource: Resource,
  page_size: u32,
) -> PaginatedStore<CommunityUser> {
  let backend = Arc::clone(backend);
  PaginatedStore::new(resource.label(), page_size, move |params| {
    backend.community_users(resource.clone(), params)
  })
}

fn group_store(
  backend: &Arc<dyn SocialBackend>,
  resource: Resource,
  page_size: u32,
) -> PaginatedStore<StudyGroup> {
  let backend = Arc::clone(backend);
  PaginatedStore::new(resource.label(), page_size, move |params| {
    backend.study_groups(resource.clone(), params)
  })
}

/// Relationship lists stop paginating after any failed request.
fn relation_store(
  backend: &Arc<dyn SocialBackend>,
  resource: Resource,
  page_size: u32,
) -> PaginatedStore<RelationUser> {
  let backend = Arc::clone(backend);
  PaginatedStore::new(resource.label(), page_size, move |params| {
    backend.relation_users(resource.clone(), params)
  })
  .with_error_policy(ErrorPolicy::StopPagination)
}
