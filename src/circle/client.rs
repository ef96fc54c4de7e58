use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::config::{CircleConfig, Config};
use crate::error::{SyncError, SyncResult};

use super::api_types::{ApiArtifact, ApiBuild};
use super::types::{Artifact, Build};

/// Read-only view of the CI provider used by the sync engine.
///
/// Implementations hold no state and never retry; every failure is returned
/// to the caller.
#[async_trait]
pub trait CiApi: Send + Sync {
  /// List builds newest first.
  async fn list_builds(&self, limit: usize, offset: usize) -> SyncResult<Vec<Build>>;

  /// List the artifacts a build has published so far.
  async fn list_artifacts(&self, build_num: i64) -> SyncResult<Vec<Artifact>>;
}

/// CircleCI v1.1 API client for a single project
#[derive(Clone)]
pub struct CircleClient {
  http: reqwest::Client,
  project_url: String,
  token: Option<String>,
}

impl CircleClient {
  pub fn new(config: &CircleConfig) -> Result<Self> {
    Self::with_token(config, Config::circle_token())
  }

  pub fn with_token(config: &CircleConfig, token: Option<String>) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create CircleCI client: {}", e))?;

    Ok(Self {
      http,
      project_url: config.project_url()?,
      token,
    })
  }

  async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SyncResult<T> {
    let mut request = self.http.get(url).header(ACCEPT, "application/json");
    if let Some(token) = &self.token {
      request = request.header("Circle-Token", token);
    }

    let body = request
      .send()
      .await
      .and_then(|resp| resp.error_for_status())
      .map_err(|source| transport_error(url, source))?
      .bytes()
      .await
      .map_err(|source| transport_error(url, source))?;

    serde_json::from_slice(&body).map_err(|source| SyncError::Decode {
      url: url.to_string(),
      source,
    })
  }
}

fn transport_error(url: &str, source: reqwest::Error) -> SyncError {
  SyncError::Transport {
    url: url.to_string(),
    source,
  }
}

#[async_trait]
impl CiApi for CircleClient {
  async fn list_builds(&self, limit: usize, offset: usize) -> SyncResult<Vec<Build>> {
    let url = format!(
      "{}?shallow=true&limit={}&offset={}",
      self.project_url, limit, offset
    );

    let builds: Vec<ApiBuild> = self.get_json(&url).await?;
    Ok(builds.into_iter().map(ApiBuild::into_build).collect())
  }

  async fn list_artifacts(&self, build_num: i64) -> SyncResult<Vec<Artifact>> {
    let url = format!("{}/{}/artifacts", self.project_url, build_num);

    let artifacts: Vec<ApiArtifact> = self.get_json(&url).await?;
    Ok(
      artifacts
        .into_iter()
        .map(|a| a.into_artifact(build_num))
        .collect(),
    )
  }
}
