//! HTTP routes linking pull requests to their newest coverage reports.

pub mod coverage;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::circle::CiApi;
use crate::config::{Config, CoverageReport};
use crate::db::Store;
use crate::error::SyncError;

use coverage::{render_page, resolve_reports};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<Store>,
  pub client: Arc<dyn CiApi>,
  pub reports: Arc<Vec<CoverageReport>>,
  /// Pull request links are this plus the pull number
  pub pulls_url: String,
}

impl AppState {
  pub fn new(config: &Config, store: Arc<Store>, client: Arc<dyn CiApi>) -> Self {
    Self {
      store,
      client,
      reports: Arc::new(config.coverage.reports.clone()),
      pulls_url: format!(
        "https://github.com/{}/{}/pull/",
        config.circleci.org, config.circleci.repo
      ),
    }
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/pull/{pull}", get(pull_page))
    .route("/pull/{pull}/{report}", get(pull_report))
    .with_state(state)
}

/// Store or provider failure while serving a request
struct AppError(SyncError);

impl From<SyncError> for AppError {
  fn from(e: SyncError) -> Self {
    Self(e)
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    tracing::error!(error = %self.0, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
  }
}

// GET /pull/{pull}
async fn pull_page(
  State(state): State<AppState>,
  Path(pull): Path<u64>,
) -> Result<Html<String>, AppError> {
  let links = resolve_reports(state.client.as_ref(), &state.store, pull, &state.reports).await?;
  let pull_url = format!("{}{}", state.pulls_url, pull);
  Ok(Html(render_page(&pull_url, pull, &links)))
}

// GET /pull/{pull}/{report}
async fn pull_report(
  State(state): State<AppState>,
  Path((pull, name)): Path<(u64, String)>,
) -> Result<Response, AppError> {
  let Some(report) = state.reports.iter().find(|r| r.name == name) else {
    return Ok((StatusCode::NOT_FOUND, format!("unknown report: {}", name)).into_response());
  };

  let links = resolve_reports(
    state.client.as_ref(),
    &state.store,
    pull,
    std::slice::from_ref(report),
  )
  .await?;

  Ok(match links.into_iter().next().and_then(|l| l.url) {
    Some(url) => Redirect::temporary(&url).into_response(),
    None => (
      StatusCode::NOT_FOUND,
      format!("{} coverage for pull/{} is not ready", name, pull),
    )
      .into_response(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{to_bytes, Body};
  use axum::http::header::LOCATION;
  use axum::http::Request;
  use tower::ServiceExt;

  use crate::circle::testing::{build, FailingCi, FakeCi};
  use crate::db::Ledger;
  use super::coverage::pull_branch;

  fn state_with(client: Arc<dyn CiApi>) -> AppState {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut b = build(11, Some("success"));
    b.branch = pull_branch(42);
    store.upsert_build(&b).unwrap();
    AppState::new(&Config::default(), store, client)
  }

  fn fake_state() -> AppState {
    let ci = FakeCi::default();
    ci.add_artifact(11, "https://a/11/go-coverage/master-coverage.html");
    state_with(Arc::new(ci))
  }

  async fn get(state: AppState, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router(state)
      .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();

    let status = response.status();
    let location = response
      .headers()
      .get(LOCATION)
      .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
  }

  #[tokio::test]
  async fn test_pull_page_lists_reports() {
    let (status, _, body) = get(fake_state(), "/pull/42").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<a href="https://github.com/determined-ai/determined/pull/42">pull/42</a>"#));
    assert!(body.contains(r##"<a href="https://a/11/go-coverage/master-coverage.html#file0">master coverage</a>"##));
    assert!(body.contains("harness coverage (not ready)"));
  }

  #[tokio::test]
  async fn test_non_numeric_pull_is_bad_request() {
    let (status, _, _) = get(fake_state(), "/pull/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(fake_state(), "/pull/abc/master").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_report_redirects_with_fragment() {
    let (status, location, _) = get(fake_state(), "/pull/42/master").await;

    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
      location.as_deref(),
      Some("https://a/11/go-coverage/master-coverage.html#file0")
    );
  }

  #[tokio::test]
  async fn test_report_not_ready_is_not_found() {
    let (status, location, body) = get(fake_state(), "/pull/42/agent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(location, None);
    assert_eq!(body, "agent coverage for pull/42 is not ready");
  }

  #[tokio::test]
  async fn test_unknown_report_is_not_found() {
    let (status, location, body) = get(fake_state(), "/pull/42/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(location, None);
    assert_eq!(body, "unknown report: nope");
  }

  #[tokio::test]
  async fn test_provider_failure_is_server_error() {
    let (status, _, body) = get(state_with(Arc::new(FailingCi)), "/pull/42/master").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("failing://ci"), "body: {body}");

    let (status, _, body) = get(state_with(Arc::new(FailingCi)), "/pull/42").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Failed to decode CI response"), "body: {body}");
  }
}
