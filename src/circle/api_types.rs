//! Serde-deserializable types matching CircleCI v1.1 API responses.
//!
//! These types are separate from the ledger types so that nullable and nested
//! provider fields can be normalized in one place.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{Artifact, Build};

#[derive(Debug, Deserialize)]
pub struct ApiWorkflows {
  pub workflow_name: Option<String>,
}

/// Build object from `GET /project/:vcs/:org/:repo?shallow=true`
#[derive(Debug, Deserialize)]
pub struct ApiBuild {
  pub build_num: i64,
  pub outcome: Option<String>,
  pub build_url: Option<String>,
  pub subject: Option<String>,
  pub branch: Option<String>,
  pub vcs_revision: Option<String>,
  pub parallel: Option<i64>,
  pub workflows: Option<ApiWorkflows>,
  pub start_time: Option<DateTime<Utc>>,
}

impl ApiBuild {
  pub fn into_build(self) -> Build {
    Build {
      build_num: self.build_num,
      url: self.build_url.unwrap_or_default(),
      subject: self.subject.unwrap_or_default(),
      branch: self.branch.unwrap_or_default(),
      commit: self.vcs_revision.unwrap_or_default(),
      parallel: self.parallel.unwrap_or(1),
      workflow: self.workflows.and_then(|w| w.workflow_name),
      start_time: self.start_time,
      outcome: self.outcome,
      archived: false,
    }
  }
}

/// Artifact object from `GET /project/:vcs/:org/:repo/:build_num/artifacts`.
/// The payload does not carry the build number.
#[derive(Debug, Deserialize)]
pub struct ApiArtifact {
  pub url: String,
}

impl ApiArtifact {
  pub fn into_artifact(self, build_num: i64) -> Artifact {
    Artifact {
      url: self.url,
      build_num,
    }
  }
}
