use chrono::Duration;
use clap::{Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::info;

use studyhub::api::{
  ApiClient, CachedApiClient, CommunityUser, GroupListing, ListParams, Notification, RelationUser,
  StudyGroup,
};
use studyhub::cache::{CacheSource, CacheStorage, MemoryStorage};
use studyhub::config::Config;
use studyhub::db::{KeyValueStore, MemoryStore, SqliteStore};
use studyhub::store::{Hub, ListItem, PaginatedStore, Session, SocialBackend};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CommunityKind {
  /// Users you share connections with
  Mutual,
  /// Users you share study groups with
  Shared,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RelationKind {
  Friends,
  Followers,
  Followings,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListingKind {
  Joined,
  Recommended,
}

impl From<ListingKind> for GroupListing {
  fn from(kind: ListingKind) -> Self {
    match kind {
      ListingKind::Joined => GroupListing::Joined,
      ListingKind::Recommended => GroupListing::Recommended,
    }
  }
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// List notifications
  Notifications {
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Mark one notification as read
  MarkRead { id: String },
  /// Mark every notification as read
  MarkAllRead,
  /// Browse community recommendations
  Community {
    #[arg(value_enum)]
    kind: CommunityKind,
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// List friends, followers or followings
  Relations {
    #[arg(value_enum)]
    kind: RelationKind,
    /// User whose relations to list (default: signed-in user)
    #[arg(long)]
    user: Option<String>,
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// List study groups
  Groups {
    #[arg(value_enum)]
    listing: ListingKind,
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Go through the request cache instead of a list store
    #[arg(long)]
    cached: bool,
    /// Drop the cached listing first (with --cached)
    #[arg(long, requires = "cached")]
    refresh: bool,
  },
  /// Show a user's stats
  Stats { user_id: String },
  /// Follow a user
  Follow { user_id: String },
  /// Unfollow a user
  Unfollow { user_id: String },
  /// Show the signed-in user
  Whoami {
    /// Fetch the profile from the server and store it
    #[arg(long)]
    refresh: bool,
  },
  /// Forget the signed-in user
  Logout,
}

/// Command runner holding the client stack.
pub struct App {
  config: Config,
  api: ApiClient,
  cached: CachedApiClient,
  hub: Hub,
}

impl App {
  pub fn new(config: Config, persist: bool) -> Result<Self> {
    let api = ApiClient::new(&config)?;
    let backend: Arc<dyn SocialBackend> = Arc::new(api.clone());

    // Session and request cache share one database file
    let (storage, cache_storage): (Arc<dyn KeyValueStore>, Arc<dyn CacheStorage>) =
      if persist && config.session.persist {
        let db = Arc::new(SqliteStore::open()?);
        let storage: Arc<dyn KeyValueStore> = db.clone();
        let cache_storage: Arc<dyn CacheStorage> = db;
        (storage, cache_storage)
      } else {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache_storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        (storage, cache_storage)
      };

    let cached = CachedApiClient::new(
      Arc::clone(&backend),
      cache_storage,
      Duration::seconds(config.cache.user_stats_ttl_secs),
    );
    let session = Session::hydrate(storage)?;
    let hub = Hub::new(backend, session, config.page_size);

    Ok(Self {
      config,
      api,
      cached,
      hub,
    })
  }

  pub async fn run(&mut self, command: Command) -> Result<()> {
    info!(?command, "Running command");

    match command {
      Command::Notifications { pages } => {
        load_pages(&mut self.hub.notifications, pages).await;
        for n in self.hub.notifications.items() {
          print_notification(n);
        }
        println!("{} unread", self.hub.unread_notifications());
        report(&self.hub.notifications);
      }
      Command::MarkRead { id } => {
        load_pages(&mut self.hub.notifications, 1).await;
        let loaded = self.hub.mark_notification_read(&id).await?;
        println!(
          "Marked {} as read{}",
          id,
          if loaded { "" } else { " (not on the first page)" }
        );
        println!("{} unread", self.hub.unread_notifications());
      }
      Command::MarkAllRead => {
        load_pages(&mut self.hub.notifications, 1).await;
        let changed = self.hub.mark_all_notifications_read().await?;
        println!("Marked {} loaded notifications as read", changed);
      }
      Command::Community { kind, pages } => {
        let store = match kind {
          CommunityKind::Mutual => &mut self.hub.mutual_connections,
          CommunityKind::Shared => &mut self.hub.shared_groups,
        };
        load_pages(store, pages).await;
        for user in store.items() {
          print_community_user(user);
        }
        report(store);
      }
      Command::Relations { kind, user, pages } => {
        let user_id = match user {
          Some(id) => id,
          None => self
            .hub
            .session()
            .user_id()
            .map(String::from)
            .ok_or_else(|| eyre!("Not signed in. Pass --user or run `whoami --refresh`."))?,
        };
        let relations = self.hub.view_relations(&user_id);
        let store = match kind {
          RelationKind::Friends => &mut relations.friends,
          RelationKind::Followers => &mut relations.followers,
          RelationKind::Followings => &mut relations.followings,
        };
        load_pages(store, pages).await;
        for user in store.items() {
          print_relation_user(user);
        }
        report(store);
      }
      Command::Groups {
        listing,
        pages,
        cached: true,
        refresh,
      } => {
        let listing: GroupListing = listing.into();
        if refresh {
          self.cached.invalidate_groups(listing);
        }
        self.browse_cached_groups(listing, pages).await?
      }
      Command::Groups { listing, pages, .. } => {
        let store = match listing {
          ListingKind::Joined => &mut self.hub.joined_groups,
          ListingKind::Recommended => &mut self.hub.recommended_groups,
        };
        load_pages(store, pages).await;
        for group in store.items() {
          print_group(group);
        }
        report(store);
      }
      Command::Stats { user_id } => {
        let result = self.cached.user_stats(&user_id).await?;
        let s = result.data;
        println!(
          "{}: {} followers, {} followings, {} friends, {} groups, {} posts",
          s.user_id, s.followers, s.followings, s.friends, s.study_groups, s.posts
        );
      }
      Command::Follow { user_id } => self.set_following(&user_id, true).await?,
      Command::Unfollow { user_id } => self.set_following(&user_id, false).await?,
      Command::Whoami { refresh } => {
        if refresh {
          let profile = self.api.me().await?;
          self.hub.session_mut().set_profile(profile)?;
        }
        match self.hub.session().profile() {
          Some(p) => println!(
            "{} ({}) @{}",
            p.name,
            p.id,
            p.username.as_deref().unwrap_or("-")
          ),
          None => println!("Not signed in"),
        }
      }
      Command::Logout => {
        self.hub.sign_out()?;
        self.cached.clear();
        println!("Signed out");
      }
    }

    Ok(())
  }

  /// Walk a listing through the request cache, one page per call.
  async fn browse_cached_groups(&self, listing: GroupListing, pages: u32) -> Result<()> {
    let mut last = None;
    for page in 1..=pages.max(1) {
      let params = ListParams::new(page, self.config.page_size);
      let result = self.cached.study_groups(listing, params).await?;
      let has_more = result.data.has_more();
      last = Some(result);
      if !has_more {
        break;
      }
    }

    if let Some(result) = last {
      for group in &result.data.study_groups {
        print_group(group);
      }
      let source = match result.source {
        CacheSource::Network => "network",
        CacheSource::Cache => "cache",
      };
      println!(
        "{} of {} groups (page {}/{}, from {})",
        result.data.study_groups.len(),
        result.data.pagination.total,
        result.data.pagination.page,
        result.data.pagination.total_pages,
        source
      );
    }
    Ok(())
  }

  async fn set_following(&mut self, user_id: &str, follow: bool) -> Result<()> {
    // Load the recommendation lists so the change has copies to land on
    load_pages(&mut self.hub.mutual_connections, 1).await;
    load_pages(&mut self.hub.shared_groups, 1).await;

    let patched = if follow {
      self.hub.follow_user(user_id).await?
    } else {
      self.hub.unfollow_user(user_id).await?
    };

    println!(
      "{} {} (updated {} loaded lists)",
      if follow { "Following" } else { "Unfollowed" },
      user_id,
      patched
    );
    Ok(())
  }
}

/// Load the first page, then up to `pages - 1` more while there are any.
async fn load_pages<T: ListItem>(store: &mut PaginatedStore<T>, pages: u32) {
  store.fetch_first_page(Vec::new());
  store.settle().await;

  for _ in 1..pages {
    if store.error().is_some() || !store.fetch_next_page() {
      break;
    }
    store.settle().await;
  }
}

fn report<T: ListItem>(store: &PaginatedStore<T>) {
  if let Some(error) = store.error() {
    eprintln!("Error loading {}: {}", store.name(), error);
  }
  let state = store.state();
  println!(
    "{} of {} {} (page {}/{}{})",
    state.items().len(),
    state.total_items(),
    store.name(),
    state.current_page(),
    state.total_pages(),
    if state.has_more() { ", more available" } else { "" }
  );
}

fn print_notification(n: &Notification) {
  let marker = if n.is_read { " " } else { "*" };
  let when = n
    .created_at
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_default();
  let actor = n.actor.as_ref().map(|a| a.name.as_str()).unwrap_or("");
  println!("{} {:<24} {:<16} {} {}", marker, n.id, when, actor, n.message);
}

fn print_community_user(u: &CommunityUser) {
  println!(
    "{:<24} {:<24} {} mutual, {} shared{}",
    u.id,
    u.name,
    u.mutual_connections,
    u.shared_groups,
    if u.is_follow { "  [following]" } else { "" }
  );
}

fn print_relation_user(u: &RelationUser) {
  println!(
    "{:<24} {:<24}{}",
    u.id,
    u.name,
    if u.is_follow { "  [following]" } else { "" }
  );
}

fn print_group(g: &StudyGroup) {
  println!(
    "{:<24} {:<32} {} members{}",
    g.id,
    g.name,
    g.member_count,
    if g.is_member { "  [member]" } else { "" }
  );
}
