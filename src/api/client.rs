use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use futures::FutureExt;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::api::api_types::{
  parse_action, parse_list_page, ApiEnvelope, ApiNotification, ApiStudyGroup, ApiUser,
  ApiUserStats,
};
use crate::api::error::ApiError;
use crate::api::resource::{ListParams, Resource};
use crate::api::types::{
  CommunityUser, Notification, Page, RelationUser, StudyGroup, UserProfile, UserStats,
};
use crate::config::Config;
use crate::store::{BackendFuture, SocialBackend};

/// REST client for the study-group service.
///
/// All failures leave this type as an `ApiError`; nothing else escapes.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token().ok();
    if token.is_none() {
      warn!("No API token configured, requests will be anonymous");
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .user_agent(concat!("studyhub/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base: base_url(&config.api.url)?,
      token,
    })
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
    let url = self
      .base
      .join(path)
      .map_err(|e| ApiError::decode(format!("Invalid endpoint {}: {}", path, e)))?;

    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  /// Send a request and return the raw body of a successful response.
  async fn send(&self, builder: RequestBuilder) -> Result<String, ApiError> {
    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      let err = ApiError::from_status(status.as_u16(), &body);
      debug!(status = status.as_u16(), message = %err.message, "Request rejected");
      return Err(err);
    }

    Ok(body)
  }

  /// Fetch one page of a list resource.
  pub async fn list<R, T>(
    &self,
    resource: &Resource,
    params: &ListParams,
  ) -> Result<Page<T>, ApiError>
  where
    R: DeserializeOwned,
    T: TryFrom<R, Error = ApiError>,
  {
    debug!(resource = resource.label(), page = params.page, "Fetching page");

    let builder = self
      .request(Method::GET, &resource.path())?
      .query(&params.query_pairs());
    let body = self.send(builder).await?;
    let page = parse_list_page::<R, T>(&body, resource.list_field())?;

    if page.page_number != params.page {
      warn!(
        resource = resource.label(),
        requested = params.page,
        returned = page.page_number,
        "Server returned a different page than requested"
      );
    }

    Ok(page)
  }

  pub async fn notifications(&self, params: &ListParams) -> Result<Page<Notification>, ApiError> {
    self
      .list::<ApiNotification, _>(&Resource::Notifications, params)
      .await
  }

  pub async fn community_users(
    &self,
    resource: &Resource,
    params: &ListParams,
  ) -> Result<Page<CommunityUser>, ApiError> {
    self.list::<ApiUser, _>(resource, params).await
  }

  pub async fn relation_users(
    &self,
    resource: &Resource,
    params: &ListParams,
  ) -> Result<Page<RelationUser>, ApiError> {
    self.list::<ApiUser, _>(resource, params).await
  }

  pub async fn study_groups(
    &self,
    resource: &Resource,
    params: &ListParams,
  ) -> Result<Page<StudyGroup>, ApiError> {
    self.list::<ApiStudyGroup, _>(resource, params).await
  }

  /// Run an action endpoint, returning the envelope message.
  async fn action(&self, method: Method, path: &str) -> Result<String, ApiError> {
    let body = self.send(self.request(method, path)?).await?;
    let envelope: ApiEnvelope<serde_json::Value> = parse_action(&body)?;
    Ok(envelope.message)
  }

  pub async fn follow(&self, user_id: &str) -> Result<String, ApiError> {
    self
      .action(Method::POST, &format!("users/{}/follow", user_id))
      .await
  }

  pub async fn unfollow(&self, user_id: &str) -> Result<String, ApiError> {
    self
      .action(Method::DELETE, &format!("users/{}/follow", user_id))
      .await
  }

  pub async fn mark_notification_read(&self, id: &str) -> Result<String, ApiError> {
    self
      .action(Method::PATCH, &format!("notifications/{}/read", id))
      .await
  }

  pub async fn mark_all_notifications_read(&self) -> Result<String, ApiError> {
    self.action(Method::PATCH, "notifications/read-all").await
  }

  /// Profile of the user the token belongs to.
  pub async fn me(&self) -> Result<UserProfile, ApiError> {
    let body = self.send(self.request(Method::GET, "users/me")?).await?;
    let envelope: ApiEnvelope<ApiUser> = parse_action(&body)?;
    let user = envelope
      .result
      .ok_or_else(|| ApiError::decode("Profile response is missing `result`"))?;
    UserProfile::try_from(user)
  }

  pub async fn user_stats(&self, user_id: &str) -> Result<UserStats, ApiError> {
    let path = format!("users/{}/stats", user_id);
    let body = self.send(self.request(Method::GET, &path)?).await?;
    let envelope: ApiEnvelope<ApiUserStats> = parse_action(&body)?;
    let stats = envelope
      .result
      .ok_or_else(|| ApiError::decode("Stats response is missing `result`"))?;
    Ok(stats.into_stats(user_id))
  }
}

impl SocialBackend for ApiClient {
  fn notifications(&self, params: ListParams) -> BackendFuture<Page<Notification>> {
    let api = self.clone();
    async move { api.notifications(&params).await }.boxed()
  }

  fn community_users(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> BackendFuture<Page<CommunityUser>> {
    let api = self.clone();
    async move { api.community_users(&resource, &params).await }.boxed()
  }

  fn relation_users(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> BackendFuture<Page<RelationUser>> {
    let api = self.clone();
    async move { api.relation_users(&resource, &params).await }.boxed()
  }

  fn study_groups(
    &self,
    resource: Resource,
    params: ListParams,
  ) -> BackendFuture<Page<StudyGroup>> {
    let api = self.clone();
    async move { api.study_groups(&resource, &params).await }.boxed()
  }

  fn follow(&self, user_id: String) -> BackendFuture<String> {
    let api = self.clone();
    async move { api.follow(&user_id).await }.boxed()
  }

  fn unfollow(&self, user_id: String) -> BackendFuture<String> {
    let api = self.clone();
    async move { api.unfollow(&user_id).await }.boxed()
  }

  fn mark_notification_read(&self, id: String) -> BackendFuture<String> {
    let api = self.clone();
    async move { api.mark_notification_read(&id).await }.boxed()
  }

  fn mark_all_notifications_read(&self) -> BackendFuture<String> {
    let api = self.clone();
    async move { api.mark_all_notifications_read().await }.boxed()
  }

  fn user_stats(&self, user_id: String) -> BackendFuture<UserStats> {
    let api = self.clone();
    async move { api.user_stats(&user_id).await }.boxed()
  }
}

/// Parse the configured base URL, making sure relative joins keep its path.
fn base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| eyre!("Invalid API url {}: {}", raw, e))
}
