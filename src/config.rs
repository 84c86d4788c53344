use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub auth: AuthConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the REST API (e.g., "https://tasks.example.com/api")
  pub url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
  /// Default account email for `login`
  pub email: Option<String>,
  /// Tokens expiring within this many seconds are renewed before use
  #[serde(default = "default_refresh_leeway_secs")]
  pub refresh_leeway_secs: i64,
}

impl Default for AuthConfig {
  fn default() -> Self {
    Self {
      email: None,
      refresh_leeway_secs: default_refresh_leeway_secs(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Entity store location (defaults to the data directory)
  pub database: Option<PathBuf>,
  /// Credential file location (defaults to the data directory)
  pub credentials: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_refresh_leeway_secs() -> i64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tasksync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tasksync/config.yaml
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
        "No configuration file found. Create one at ~/.config/tasksync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("tasksync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tasksync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.server.url.trim().is_empty() {
      return Err(eyre!("server.url must not be empty"));
    }
    Ok(config)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.server.timeout_secs)
  }

  pub fn refresh_leeway(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.auth.refresh_leeway_secs)
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.storage.database {
      Some(path) => Ok(path.clone()),
      None => Ok(db::default_path()?),
    }
  }

  pub fn credentials_path(&self) -> Result<PathBuf> {
    match &self.storage.credentials {
      Some(path) => Ok(path.clone()),
      None => Ok(db::data_dir()?.join("credentials.json")),
    }
  }

  /// Get the account password from the environment.
  ///
  /// Checks TASKSYNC_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("TASKSYNC_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set the TASKSYNC_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config = Config::parse("server:\n  url: https://tasks.example.com/api\n").unwrap();
    assert_eq!(config.server.timeout_secs, 30);
    assert_eq!(config.auth.refresh_leeway_secs, 30);
    assert_eq!(config.auth.email, None);
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert!(config.storage.database.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
server:
  url: https://tasks.example.com/api
  timeout_secs: 5
auth:
  email: ada@example.com
  refresh_leeway_secs: 120
storage:
  database: /tmp/tasksync/cache.db
  credentials: /tmp/tasksync/creds.json
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.auth.email.as_deref(), Some("ada@example.com"));
    assert_eq!(config.refresh_leeway(), chrono::Duration::minutes(2));
    assert_eq!(
      config.database_path().unwrap(),
      PathBuf::from("/tmp/tasksync/cache.db")
    );
    assert_eq!(
      config.credentials_path().unwrap(),
      PathBuf::from("/tmp/tasksync/creds.json")
    );
  }

  #[test]
  fn test_missing_or_empty_url_is_rejected() {
    assert!(Config::parse("auth:\n  email: a@b.c\n").is_err());
    assert!(Config::parse("server:\n  url: ''\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_errors() {
    let err = Config::load(Some(Path::new("/nonexistent/tasksync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
