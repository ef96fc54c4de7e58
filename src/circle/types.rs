use chrono::{DateTime, Utc};

/// One run of the CI pipeline, as recorded in the build ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
  pub build_num: i64,
  pub url: String,
  pub subject: String,
  pub branch: String,
  pub commit: String,
  pub parallel: i64,
  pub workflow: Option<String>,
  /// None while the build is queued
  pub start_time: Option<DateTime<Utc>>,
  /// Terminal outcome ("success", "failed", ...); None while running
  pub outcome: Option<String>,
  /// Local metadata: artifacts were cached after the build finished.
  /// Never sent by the provider.
  pub archived: bool,
}

impl Build {
  /// A build with an outcome will not publish any more artifacts
  pub fn is_finished(&self) -> bool {
    self.outcome.is_some()
  }

  /// Whether this build started at or before `boundary`.
  /// Builds that have not started yet are never considered old.
  pub fn started_before(&self, boundary: DateTime<Utc>) -> bool {
    self.start_time.is_some_and(|start| start <= boundary)
  }
}

/// A published build artifact. Only the URL is cached, never the content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
  pub url: String,
  pub build_num: i64,
}
