//! Write-once artifact cache.
//!
//! A build's artifacts are fetched live while it runs. The first fetch after
//! it finishes is committed to the store and the build is flagged archived;
//! from then on reads never reach the provider.

use tracing::debug;

use crate::circle::{Artifact, Build, CiApi};
use crate::db::{Ledger, Store};
use crate::error::SyncResult;

/// Artifacts for `build`, from the cache when it is archived and live
/// otherwise. A live fetch of a finished build is cached on the way out.
pub async fn artifacts_with_cache<C: CiApi + ?Sized>(
  client: &C,
  store: &Store,
  build: &Build,
) -> SyncResult<Vec<Artifact>> {
  if build.archived {
    return store.get_artifacts(build.build_num);
  }

  let artifacts = client.list_artifacts(build.build_num).await?;

  if build.is_finished() {
    cache_artifacts(store, build.build_num, &artifacts)?;
    debug!(build = build.build_num, count = artifacts.len(), "Cached artifacts");
  }

  Ok(artifacts)
}

/// Commit a finished build's artifacts, then flag it archived.
///
/// Artifacts go in first: a crash in between leaves an unarchived build whose
/// artifacts are fetched again and inserted as no-ops.
pub fn cache_artifacts(
  ledger: &impl Ledger,
  build_num: i64,
  artifacts: &[Artifact],
) -> SyncResult<()> {
  ledger.upsert_artifacts(artifacts)?;
  ledger.archive_build(build_num)
}

/// Archive the newest archivable build, if there is one.
/// Returns the build number that was archived.
pub async fn archive_next<C: CiApi + ?Sized>(client: &C, store: &Store) -> SyncResult<Option<i64>> {
  let Some(build) = store.get_archivable_build()? else {
    return Ok(None);
  };

  debug!(build = build.build_num, "Fetching artifacts");
  let artifacts = client.list_artifacts(build.build_num).await?;
  cache_artifacts(store, build.build_num, &artifacts)?;

  Ok(Some(build.build_num))
}
