//! Resolve a pull request to the newest artifact of each coverage report.

use crate::circle::CiApi;
use crate::config::CoverageReport;
use crate::db::{Ledger, Store};
use crate::error::SyncResult;
use crate::sync::artifacts_with_cache;

/// A coverage report and, once some build has published it, its link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLink {
  pub name: String,
  pub url: Option<String>,
}

/// Branch name CircleCI uses for builds of a pull request
pub fn pull_branch(pull: u64) -> String {
  format!("pull/{}", pull)
}

/// Walk the pull request's builds newest first until every report has a
/// link. Artifacts of finished builds get cached along the way.
pub async fn resolve_reports<C: CiApi + ?Sized>(
  client: &C,
  store: &Store,
  pull: u64,
  reports: &[CoverageReport],
) -> SyncResult<Vec<ReportLink>> {
  let mut links: Vec<ReportLink> = reports
    .iter()
    .map(|r| ReportLink {
      name: r.name.clone(),
      url: None,
    })
    .collect();

  for build in store.get_builds_for_branch(&pull_branch(pull))? {
    if links.iter().all(|l| l.url.is_some()) {
      break;
    }

    let artifacts = artifacts_with_cache(client, store, &build).await?;
    for artifact in &artifacts {
      for (link, report) in links.iter_mut().zip(reports) {
        if link.url.is_none() && artifact.url.ends_with(&report.suffix) {
          link.url = Some(format!("{}{}", artifact.url, report.fragment));
        }
      }
    }
  }

  Ok(links)
}

/// Render the HTML page listing every report for a pull request.
pub fn render_page(pull_url: &str, pull: u64, links: &[ReportLink]) -> String {
  let mut html = format!(
    r#"<html>coverage reports for <a href="{}">pull/{}</a>:<br>"#,
    escape_html(pull_url),
    pull
  );

  for link in links {
    let line = match &link.url {
      Some(url) => format!(
        r#"<a href="{}">{} coverage</a><br>"#,
        escape_html(url),
        escape_html(&link.name)
      ),
      None => format!(
        r#"<font color="gray">{} coverage (not ready)</font><br>"#,
        escape_html(&link.name)
      ),
    };
    html.push_str(&line);
  }

  html.push_str("</html>");
  html
}

fn escape_html(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}
