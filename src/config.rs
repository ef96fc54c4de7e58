use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// SQLite ledger path (default: $XDG_DATA_HOME/shortcuts/shortcuts.db)
  pub database: Option<PathBuf>,
  pub listen: SocketAddr,
  /// Optional log file, rotated daily
  pub log_file: Option<PathBuf>,
  pub circleci: CircleConfig,
  pub sync: SyncConfig,
  pub coverage: CoverageConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database: None,
      listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
      log_file: None,
      circleci: CircleConfig::default(),
      sync: SyncConfig::default(),
      coverage: CoverageConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircleConfig {
  pub base_url: String,
  /// VCS slug used in project paths: "github" or "bitbucket"
  pub vcs: String,
  pub org: String,
  pub repo: String,
  pub timeout_secs: u64,
}

impl Default for CircleConfig {
  fn default() -> Self {
    Self {
      base_url: "https://circleci.com/api/v1.1".to_string(),
      vcs: "github".to_string(),
      org: "determined-ai".to_string(),
      repo: "determined".to_string(),
      timeout_secs: 30,
    }
  }
}

impl CircleConfig {
  /// Base URL of the project, e.g. https://circleci.com/api/v1.1/project/github/org/repo
  pub fn project_url(&self) -> Result<String> {
    let base = Url::parse(&self.base_url)
      .map_err(|e| eyre!("Invalid circleci.base_url {}: {}", self.base_url, e))?;

    Ok(format!(
      "{}/project/{}/{}/{}",
      base.as_str().trim_end_matches('/'),
      self.vcs,
      self.org,
      self.repo
    ))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Builds requested per list-builds call
  pub page_size: usize,
  /// How long the provider keeps artifacts around
  pub retention_days: i64,
  pub refresh_interval_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      page_size: 100,
      retention_days: 30,
      refresh_interval_secs: 15,
    }
  }
}

impl SyncConfig {
  pub fn retention(&self) -> chrono::Duration {
    chrono::Duration::days(self.retention_days)
  }

  pub fn refresh_interval(&self) -> Duration {
    Duration::from_secs(self.refresh_interval_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
  pub reports: Vec<CoverageReport>,
}

/// A coverage report recognized by the suffix of its artifact URL
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoverageReport {
  pub name: String,
  pub suffix: String,
  /// Appended to the artifact URL when linking (e.g. "#file0")
  #[serde(default)]
  pub fragment: String,
}

impl CoverageReport {
  fn new(name: &str, suffix: &str, fragment: &str) -> Self {
    Self {
      name: name.to_string(),
      suffix: suffix.to_string(),
      fragment: fragment.to_string(),
    }
  }
}

impl Default for CoverageConfig {
  fn default() -> Self {
    Self {
      reports: vec![
        CoverageReport::new("harness", "cov-html/harness/index.html", ""),
        CoverageReport::new("model_hub", "cov-html/model_hub/index.html", ""),
        CoverageReport::new("master", "go-coverage/master-coverage.html", "#file0"),
        CoverageReport::new("agent", "go-coverage/agent-coverage.html", "#file0"),
        CoverageReport::new(
          "webui",
          "webui/react/coverage/lcov-report/index.html",
          "",
        ),
      ],
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shortcuts.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shortcuts/config.yaml
  /// 4. Built-in defaults
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shortcuts.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shortcuts").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents)?;
    // Fail at startup rather than on the first refresh
    config.circleci.project_url()?;
    Ok(config)
  }

  /// Resolve the ledger path, falling back to the user data directory.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("shortcuts").join("shortcuts.db"))
  }

  /// Get the CircleCI API token from environment variables, if any.
  ///
  /// Checks SHORTCUTS_CIRCLE_TOKEN first, then CIRCLE_TOKEN as fallback.
  /// Public projects can be read without a token.
  pub fn circle_token() -> Option<String> {
    std::env::var("SHORTCUTS_CIRCLE_TOKEN")
      .or_else(|_| std::env::var("CIRCLE_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }
}
