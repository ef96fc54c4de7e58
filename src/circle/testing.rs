//! In-memory CI provider doubles for engine tests.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

use super::client::CiApi;
use super::types::{Artifact, Build};

/// Build started just now on branch "main"
pub fn build(build_num: i64, outcome: Option<&str>) -> Build {
  build_started_at(build_num, outcome, Utc::now().trunc_subsecs(0))
}

pub fn build_started_at(build_num: i64, outcome: Option<&str>, start: DateTime<Utc>) -> Build {
  Build {
    build_num,
    url: format!("https://circleci.com/gh/acme/widgets/{}", build_num),
    subject: format!("commit for build {}", build_num),
    branch: "main".to_string(),
    commit: format!("{:040x}", build_num),
    parallel: 1,
    workflow: Some("test".to_string()),
    start_time: Some(start),
    outcome: outcome.map(String::from),
    archived: false,
  }
}

pub fn artifact(build_num: i64, url: &str) -> Artifact {
  Artifact {
    url: url.to_string(),
    build_num,
  }
}

/// Serves a fixed, newest-first build list and per-build artifacts.
#[derive(Default)]
pub struct FakeCi {
  builds: Mutex<Vec<Build>>,
  artifacts: Mutex<HashMap<i64, Vec<String>>>,
  build_calls: AtomicUsize,
  artifact_requests: Mutex<Vec<i64>>,
}

impl FakeCi {
  /// Builds are served in the order given; callers list them newest first.
  pub fn new(builds: Vec<Build>) -> Self {
    Self {
      builds: Mutex::new(builds),
      ..Self::default()
    }
  }

  pub fn set_builds(&self, builds: Vec<Build>) {
    *self.builds.lock().unwrap() = builds;
  }

  pub fn add_artifact(&self, build_num: i64, url: &str) {
    self
      .artifacts
      .lock()
      .unwrap()
      .entry(build_num)
      .or_default()
      .push(url.to_string());
  }

  pub fn build_calls(&self) -> usize {
    self.build_calls.load(Ordering::SeqCst)
  }

  /// Build numbers passed to `list_artifacts`, in call order
  pub fn artifact_requests(&self) -> Vec<i64> {
    self.artifact_requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl CiApi for FakeCi {
  async fn list_builds(&self, limit: usize, offset: usize) -> SyncResult<Vec<Build>> {
    self.build_calls.fetch_add(1, Ordering::SeqCst);
    let builds = self.builds.lock().unwrap();
    Ok(builds.iter().skip(offset).take(limit).cloned().collect())
  }

  async fn list_artifacts(&self, build_num: i64) -> SyncResult<Vec<Artifact>> {
    self.artifact_requests.lock().unwrap().push(build_num);
    let artifacts = self.artifacts.lock().unwrap();
    Ok(
      artifacts
        .get(&build_num)
        .into_iter()
        .flatten()
        .map(|url| artifact(build_num, url))
        .collect(),
    )
  }
}

/// Fails every call, to prove a code path never reaches the provider.
pub struct FailingCi;

fn decode_failure() -> SyncError {
  SyncError::Decode {
    url: "failing://ci".to_string(),
    source: serde_json::from_str::<i64>("not json").unwrap_err(),
  }
}

#[async_trait]
impl CiApi for FailingCi {
  async fn list_builds(&self, _limit: usize, _offset: usize) -> SyncResult<Vec<Build>> {
    Err(decode_failure())
  }

  async fn list_artifacts(&self, _build_num: i64) -> SyncResult<Vec<Artifact>> {
    Err(decode_failure())
  }
}
