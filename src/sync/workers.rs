//! The two background loops driving synchronization.
//!
//! The refresher polls the provider on a fixed interval and wakes the
//! archiver after every attempt. The archiver drains archivable builds until
//! none are left, then blocks until the next wake.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::circle::CiApi;
use crate::db::Store;
use crate::error::SyncResult;

use super::artifacts::archive_next;
use super::refresh::{RefreshOutcome, Refresher};
use super::signal::{WakeReceiver, WakeSender};

/// Refresh the ledger every `interval`, forever.
pub async fn run_refresher<C: CiApi + ?Sized>(
  refresher: Refresher<C>,
  interval: Duration,
  wake: WakeSender,
) {
  info!(interval_secs = interval.as_secs(), "Build refresher started");
  loop {
    tokio::time::sleep(interval).await;
    refresh_tick(&refresher, &wake).await;
  }
}

/// One refresher cycle. The archiver is woken whether or not the refresh
/// succeeded, since earlier cycles may have left archivable builds behind.
pub async fn refresh_tick<C: CiApi + ?Sized>(
  refresher: &Refresher<C>,
  wake: &WakeSender,
) -> bool {
  debug!("Refreshing builds");
  let refreshed = match refresher.refresh(false).await {
    Ok(RefreshOutcome::Refreshed { after, ingested }) => {
      if ingested > 0 {
        info!(after, ingested, "Refreshed builds");
      }
      true
    }
    Ok(RefreshOutcome::Bootstrapped { ingested }) => {
      info!(ingested, "Bootstrapped builds");
      true
    }
    Err(e) => {
      error!(error = %e, "Build refresh failed");
      false
    }
  };

  if !wake.wake() {
    debug!("Archiver wake already pending");
  }
  refreshed
}

/// Archive builds until none are archivable. Returns how many were archived.
pub async fn drain<C: CiApi + ?Sized>(client: &C, store: &Store) -> SyncResult<usize> {
  let mut archived = 0;
  while let Some(build_num) = archive_next(client, store).await? {
    info!(build = build_num, "Archived build artifacts");
    archived += 1;
  }
  Ok(archived)
}

/// Drain, block on the wake signal, repeat.
///
/// Returns the number of drain passes once every wake sender is gone.
pub async fn run_archiver<C: CiApi + ?Sized>(
  client: Arc<C>,
  store: Arc<Store>,
  mut wake: WakeReceiver,
) -> usize {
  info!("Artifact archiver started");
  let mut passes = 0;
  loop {
    passes += 1;
    match drain(client.as_ref(), &store).await {
      Ok(0) => debug!("No archivable builds"),
      Ok(archived) => debug!(archived, "Drain pass complete"),
      // Not retried until the next wake
      Err(e) => error!(error = %e, "Artifact archiving failed"),
    }

    if !wake.wait().await {
      info!(passes, "Artifact archiver stopped");
      return passes;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use tokio::sync::{Notify, Semaphore};

  use crate::circle::testing::{artifact, build, FailingCi, FakeCi};
  use crate::circle::{Artifact, Build};
  use crate::config::SyncConfig;
  use crate::db::Ledger;
  use crate::sync::signal::archive_signal;

  fn seeded_store() -> Arc<Store> {
    let store = Store::open_in_memory().unwrap();
    for b in [
      build(1, Some("success")),
      build(2, Some("failed")),
      build(3, None),
    ] {
      store.upsert_build(&b).unwrap();
    }
    Arc::new(store)
  }

  #[tokio::test]
  async fn test_archiver_drains_newest_first() {
    let store = seeded_store();
    let ci = Arc::new(FakeCi::default());
    ci.add_artifact(1, "https://a/1.html");
    ci.add_artifact(2, "https://a/2.html");
    let (tx, rx) = archive_signal();
    drop(tx);

    let passes = run_archiver(ci.clone(), store.clone(), rx).await;

    assert_eq!(passes, 1);
    assert_eq!(ci.artifact_requests(), vec![2, 1]);
    assert_eq!(store.get_artifacts(1).unwrap(), vec![artifact(1, "https://a/1.html")]);
    assert!(store.get_build(2).unwrap().unwrap().archived);
    assert!(!store.get_build(3).unwrap().unwrap().archived);
  }

  /// Blocks every artifact fetch until the gate opens.
  struct GatedCi {
    fetching: Notify,
    gate: Semaphore,
  }

  impl GatedCi {
    fn new() -> Self {
      Self {
        fetching: Notify::new(),
        gate: Semaphore::new(0),
      }
    }
  }

  #[async_trait]
  impl CiApi for GatedCi {
    async fn list_builds(&self, _limit: usize, _offset: usize) -> SyncResult<Vec<Build>> {
      Ok(Vec::new())
    }

    async fn list_artifacts(&self, _build_num: i64) -> SyncResult<Vec<Artifact>> {
      self.fetching.notify_one();
      let _permit = self.gate.acquire().await.unwrap();
      Ok(Vec::new())
    }
  }

  #[tokio::test]
  async fn test_wakes_during_drain_cause_one_extra_pass() {
    let store = seeded_store();
    let ci = Arc::new(GatedCi::new());
    let (tx, rx) = archive_signal();
    let archiver = tokio::spawn(run_archiver(ci.clone(), store.clone(), rx));

    ci.fetching.notified().await;
    let sent: Vec<bool> = (0..3).map(|_| tx.wake()).collect();
    drop(tx);
    ci.gate.add_permits(1);

    assert_eq!(sent, vec![true, false, false]);
    assert_eq!(archiver.await.unwrap(), 2);
    assert_eq!(store.get_archivable_build().unwrap(), None);
  }

  #[tokio::test]
  async fn test_archiver_error_ends_pass() {
    let store = seeded_store();
    let (tx, rx) = archive_signal();
    drop(tx);

    let passes = run_archiver(Arc::new(FailingCi), store.clone(), rx).await;

    assert_eq!(passes, 1);
    assert_eq!(store.get_archivable_build().unwrap().unwrap().build_num, 2);
  }

  #[tokio::test]
  async fn test_failed_refresh_still_wakes_archiver() {
    let store = seeded_store();
    let refresher = Refresher::new(Arc::new(FailingCi), store, &SyncConfig::default());
    let (tx, mut rx) = archive_signal();

    assert!(!refresh_tick(&refresher, &tx).await);

    drop(tx);
    assert!(rx.wait().await);
  }

  #[tokio::test]
  async fn test_refresh_then_archive() {
    let store = seeded_store();
    let ci = Arc::new(FakeCi::new(vec![
      build(5, Some("success")),
      build(4, None),
      build(3, Some("success")),
      build(2, Some("failed")),
    ]));
    ci.add_artifact(5, "https://a/5.html");
    let refresher = Refresher::new(ci.clone(), store.clone(), &SyncConfig::default());
    let (tx, rx) = archive_signal();

    assert!(refresh_tick(&refresher, &tx).await);
    drop(tx);
    run_archiver(ci.clone(), store.clone(), rx).await;

    assert!(store.get_build(5).unwrap().unwrap().archived);
    assert!(store.get_build(3).unwrap().unwrap().archived);
    assert!(!store.get_build(4).unwrap().unwrap().archived);
    assert_eq!(store.get_artifacts(5).unwrap(), vec![artifact(5, "https://a/5.html")]);
  }
}
