use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Items requested per page for every list
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL, e.g. https://api.example.com/api/v1
  pub url: String,
  /// Seconds before a request counts as failed
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds an unused user-stats entry is kept
  #[serde(default = "default_user_stats_ttl_secs")]
  pub user_stats_ttl_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      user_stats_ttl_secs: default_user_stats_ttl_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Keep the signed-in profile and request cache on disk between runs
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { persist: true }
  }
}

fn default_page_size() -> u32 {
  10
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_user_stats_ttl_secs() -> i64 {
  crate::api::cache::USER_STATS_KEEP_UNUSED_SECS
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./studyhub.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/studyhub/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/studyhub/config.yaml\n\
                 with at least `api.url` set."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("studyhub.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("studyhub").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;

    if config.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }

    let ttl = config.cache.user_stats_ttl_secs;
    if ttl < 0 || chrono::Duration::try_seconds(ttl).is_none() {
      return Err(eyre!("cache.user_stats_ttl_secs out of range: {}", ttl));
    }

    Ok(config)
  }

  /// Get the API token from the environment.
  ///
  /// Checks STUDYHUB_API_TOKEN.
  pub fn get_api_token() -> Result<String> {
    std::env::var("STUDYHUB_API_TOKEN")
      .map_err(|_| eyre!("API token not found. Set the STUDYHUB_API_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: https://example.com/api\n").unwrap();
    assert_eq!(config.api.url, "https://example.com/api");
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.page_size, 10);
    assert_eq!(config.cache.user_stats_ttl_secs, 300);
    assert!(config.session.persist);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  url: http://localhost:4000
  timeout_secs: 3
page_size: 25
cache:
  user_stats_ttl_secs: 60
session:
  persist: false
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 3);
    assert_eq!(config.page_size, 25);
    assert_eq!(config.cache.user_stats_ttl_secs, 60);
    assert!(!config.session.persist);
  }

  #[test]
  fn test_zero_page_size_rejected() {
    assert!(Config::parse("api:\n  url: http://x\npage_size: 0\n").is_err());
  }

  #[test]
  fn test_user_stats_ttl_range() {
    let yaml =
      |ttl: &str| format!("api:\n  url: http://x\ncache:\n  user_stats_ttl_secs: {}\n", ttl);
    assert!(Config::parse(&yaml("-1")).is_err());
    assert!(Config::parse(&yaml(&i64::MAX.to_string())).is_err());
    assert_eq!(Config::parse(&yaml("0")).unwrap().cache.user_stats_ttl_secs, 0);
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/studyhub.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
