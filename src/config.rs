use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::{CacheOptions, StaleTime};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL the resource paths are joined onto (e.g. "https://host/api/")
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a fetched payload counts as stale
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Seconds an unobserved entry is kept before collection
  #[serde(default = "default_gc_secs")]
  pub gc_secs: u64,
}

fn default_stale_secs() -> u64 {
  60
}

fn default_gc_secs() -> u64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      gc_secs: default_gc_secs(),
    }
  }
}

impl CacheConfig {
  pub fn options(&self) -> CacheOptions {
    CacheOptions {
      stale_time: StaleTime::After(Duration::from_secs(self.stale_secs)),
      gc_time: Duration::from_secs(self.gc_secs),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Config {
  /// Configuration with defaults for everything but the API URL.
  pub fn for_url(url: impl Into<String>) -> Self {
    Self {
      api: ApiConfig {
        url: url.into(),
        timeout_secs: default_timeout_secs(),
      },
      cache: CacheConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./propcat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/propcat/config.yaml
  ///
  /// With no file found, `api_url` alone is enough to run on defaults.
  pub fn load(explicit_path: Option<&Path>, api_url: Option<&str>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match (path, api_url) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(url)) => Self::for_url(url),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/propcat/config.yaml \
           or pass --api-url."
        ))
      }
    };

    Ok(match api_url {
      Some(url) => Self {
        api: ApiConfig {
          url: url.to_string(),
          ..config.api
        },
        ..config
      },
      None => config,
    })
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("propcat.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("propcat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the API bearer token from the PROPCAT_TOKEN environment variable.
  pub fn get_api_token() -> Result<String> {
    std::env::var("PROPCAT_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
      .ok_or_else(|| eyre!("API token not found. Set the PROPCAT_TOKEN environment variable."))
  }
}
