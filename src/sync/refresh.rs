//! Keeps the build ledger current with the CI provider.
//!
//! Every attempt re-derives its strategy from the ledger:
//! - no finished build older than every unfinished one → bootstrap, a walk
//!   back through the artifact retention window
//! - otherwise → incremental, ingesting only builds newer than that
//!   finished build
//!
//! A walk gathers its builds first and then writes them in one transaction,
//! so a failed attempt leaves the ledger untouched.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::circle::{Build, CiApi};
use crate::config::SyncConfig;
use crate::db::{Ledger, Store};
use crate::error::{SyncError, SyncResult};

/// Bootstrap progress is logged every this many builds
const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
  Bootstrap,
  /// Ingest builds strictly newer than `after`
  Incremental { after: i64 },
}

/// Decide how to refresh from the current ledger contents.
pub fn plan_refresh(ledger: &impl Ledger) -> SyncResult<RefreshPlan> {
  let oldest_unfinished = ledger.oldest_unfinished_build()?;
  let cursor = ledger.latest_finished_before(oldest_unfinished.as_ref())?;

  Ok(match cursor {
    Some(cursor) => RefreshPlan::Incremental {
      after: cursor.build_num,
    },
    None => RefreshPlan::Bootstrap,
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
  Bootstrapped { ingested: usize },
  Refreshed { after: i64, ingested: usize },
}

/// Runs refresh attempts against one CI project and one store
pub struct Refresher<C: ?Sized> {
  client: Arc<C>,
  store: Arc<Store>,
  page_size: usize,
  retention: Duration,
}

impl<C: CiApi + ?Sized> Refresher<C> {
  pub fn new(client: Arc<C>, store: Arc<Store>, config: &SyncConfig) -> Self {
    Self {
      client,
      store,
      page_size: config.page_size.max(1),
      retention: config.retention(),
    }
  }

  /// Bring the ledger up to date.
  ///
  /// Fails with [`SyncError::NeedsBootstrap`] when the ledger needs a
  /// bootstrap and `allow_bootstrap` is false.
  pub async fn refresh(&self, allow_bootstrap: bool) -> SyncResult<RefreshOutcome> {
    match plan_refresh(self.store.as_ref())? {
      RefreshPlan::Bootstrap if !allow_bootstrap => Err(SyncError::NeedsBootstrap),
      RefreshPlan::Bootstrap => self.bootstrap(Utc::now()).await,
      RefreshPlan::Incremental { after } => self.refresh_after(after).await,
    }
  }

  async fn bootstrap(&self, now: DateTime<Utc>) -> SyncResult<RefreshOutcome> {
    info!("Bootstrapping build ledger, this may take a while");

    let builds = self.collect_recent(now - self.retention).await?;
    let ingested = self.ingest(&builds)?;

    info!(ingested, "Bootstrapping build ledger complete");
    Ok(RefreshOutcome::Bootstrapped { ingested })
  }

  /// Walk the build list from the newest build back to the first one that
  /// started at or before `boundary`. That build is the last one collected;
  /// anything older has no artifacts left to link to. Keeping the boundary
  /// build means the oldest stored build may sit just outside the window.
  async fn collect_recent(&self, boundary: DateTime<Utc>) -> SyncResult<Vec<Build>> {
    let mut collected = Vec::new();
    let mut reported = 0;
    let mut offset = 0;

    loop {
      let page = self.client.list_builds(self.page_size, offset).await?;
      if page.is_empty() {
        debug!(offset, "Build list exhausted");
        return Ok(collected);
      }
      offset += page.len();

      for build in page {
        let expired = build.started_before(boundary);
        collected.push(build);
        if expired {
          info!(
            days = self.retention.num_days(),
            "Reached the artifact retention window, not walking further back"
          );
          return Ok(collected);
        }
      }

      if collected.len() >= reported + PROGRESS_EVERY {
        reported = collected.len();
        info!(found = reported, "Bootstrap in progress");
      }
    }
  }

  async fn refresh_after(&self, after: i64) -> SyncResult<RefreshOutcome> {
    let builds = self.collect_newer(after).await?;
    let ingested = self.ingest(&builds)?;

    debug!(after, ingested, "Incremental refresh complete");
    Ok(RefreshOutcome::Refreshed { after, ingested })
  }

  /// Walk the build list until reaching build `after`, which the provider
  /// must still be listing.
  async fn collect_newer(&self, after: i64) -> SyncResult<Vec<Build>> {
    let mut collected = Vec::new();
    let mut offset = 0;

    loop {
      let page = self.client.list_builds(self.page_size, offset).await?;
      if page.is_empty() {
        return Err(SyncError::Consistency { cursor: after });
      }
      offset += page.len();

      for build in page {
        if build.build_num <= after {
          return Ok(collected);
        }
        collected.push(build);
      }
    }
  }

  fn ingest(&self, builds: &[Build]) -> SyncResult<usize> {
    self.store.transaction(|tx| {
      for build in builds {
        tx.upsert_build(build)?;
      }
      Ok(builds.len())
    })
  }
}
