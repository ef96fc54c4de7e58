//! Build ledger operations shared by the auto-commit and transactional handles.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::circle::{Artifact, Build};
use crate::error::SyncResult;

const BUILD_COLUMNS: &str =
  r#"build_num, url, branch, subject, "commit", parallel, workflow, start_time, outcome, archived"#;

fn build_from_row(row: &Row<'_>) -> rusqlite::Result<Build> {
  Ok(Build {
    build_num: row.get(0)?,
    url: row.get(1)?,
    branch: row.get(2)?,
    subject: row.get(3)?,
    commit: row.get(4)?,
    parallel: row.get(5)?,
    workflow: row.get(6)?,
    start_time: row.get(7)?,
    outcome: row.get(8)?,
    archived: row.get(9)?,
  })
}

fn select_one(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Option<Build>> {
  let sql = format!("SELECT {} FROM builds {}", BUILD_COLUMNS, filter);
  conn
    .prepare_cached(&sql)?
    .query_row(params, build_from_row)
    .optional()
}

fn select_many(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Build>> {
  let sql = format!("SELECT {} FROM builds {}", BUILD_COLUMNS, filter);
  let mut stmt = conn.prepare_cached(&sql)?;
  let builds = stmt
    .query_map(params, build_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(builds)
}

/// Operations on the build ledger.
///
/// Implemented by [`Store`](super::Store), where every call commits on its
/// own, and by [`StoreTx`](super::StoreTx), where calls land together when the
/// enclosing transaction commits. Ledger logic is written once against this
/// trait and the caller picks the handle.
pub trait Ledger {
  /// Run `f` against the underlying connection.
  fn with_conn<T, F>(&self, f: F) -> SyncResult<T>
  where
    F: FnOnce(&Connection) -> rusqlite::Result<T>;

  /// Insert a build, or refresh its provider fields if already known.
  /// `archived` is never touched.
  fn upsert_build(&self, build: &Build) -> SyncResult<()> {
    self.with_conn(|conn| {
      conn
        .prepare_cached(
          r#"INSERT INTO builds (build_num, url, branch, subject, "commit", parallel, workflow, start_time, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (build_num) DO UPDATE SET
               url = excluded.url,
               branch = excluded.branch,
               subject = excluded.subject,
               "commit" = excluded."commit",
               parallel = excluded.parallel,
               workflow = excluded.workflow,
               start_time = excluded.start_time,
               outcome = excluded.outcome"#,
        )?
        .execute(params![
          build.build_num,
          build.url,
          build.branch,
          build.subject,
          build.commit,
          build.parallel,
          build.workflow,
          build.start_time,
          build.outcome,
        ])?;
      Ok(())
    })
  }

  fn get_build(&self, build_num: i64) -> SyncResult<Option<Build>> {
    self.with_conn(|conn| select_one(conn, "WHERE build_num = ?1", params![build_num]))
  }

  /// Builds whose branch matches a GLOB pattern, newest first.
  /// A plain branch name matches only itself.
  fn get_builds_for_branch(&self, pattern: &str) -> SyncResult<Vec<Build>> {
    self.with_conn(|conn| {
      select_many(
        conn,
        "WHERE branch GLOB ?1 ORDER BY build_num DESC",
        params![pattern],
      )
    })
  }

  fn oldest_unfinished_build(&self) -> SyncResult<Option<Build>> {
    self.with_conn(|conn| {
      select_one(
        conn,
        "WHERE outcome IS NULL ORDER BY build_num ASC LIMIT 1",
        [],
      )
    })
  }

  /// Newest finished build, strictly older than `cursor` when one is given.
  fn latest_finished_before(&self, cursor: Option<&Build>) -> SyncResult<Option<Build>> {
    self.with_conn(|conn| match cursor {
      Some(cursor) => select_one(
        conn,
        "WHERE outcome IS NOT NULL AND build_num < ?1 ORDER BY build_num DESC LIMIT 1",
        params![cursor.build_num],
      ),
      None => select_one(
        conn,
        "WHERE outcome IS NOT NULL ORDER BY build_num DESC LIMIT 1",
        [],
      ),
    })
  }

  /// Newest finished build whose artifacts are not cached yet.
  fn get_archivable_build(&self) -> SyncResult<Option<Build>> {
    self.with_conn(|conn| {
      select_one(
        conn,
        "WHERE outcome IS NOT NULL AND archived = FALSE ORDER BY build_num DESC LIMIT 1",
        [],
      )
    })
  }

  fn unarchived_builds(&self) -> SyncResult<Vec<Build>> {
    self.with_conn(|conn| {
      select_many(
        conn,
        "WHERE archived = FALSE ORDER BY build_num DESC",
        [],
      )
    })
  }

  /// Mark a build's artifacts as cached. No-op for unknown builds.
  fn archive_build(&self, build_num: i64) -> SyncResult<()> {
    self.with_conn(|conn| {
      conn
        .prepare_cached("UPDATE builds SET archived = TRUE WHERE build_num = ?1")?
        .execute(params![build_num])?;
      Ok(())
    })
  }

  /// Cache artifacts; URLs already cached are left as they are.
  fn upsert_artifacts(&self, artifacts: &[Artifact]) -> SyncResult<()> {
    if artifacts.is_empty() {
      return Ok(());
    }
    self.with_conn(|conn| {
      let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO artifacts (url, build_num) VALUES (?1, ?2)")?;
      for artifact in artifacts {
        stmt.execute(params![artifact.url, artifact.build_num])?;
      }
      Ok(())
    })
  }

  fn get_artifacts(&self, build_num: i64) -> SyncResult<Vec<Artifact>> {
    self.with_conn(|conn| {
      let mut stmt = conn
        .prepare_cached("SELECT url, build_num FROM artifacts WHERE build_num = ?1 ORDER BY url")?;
      let artifacts = stmt
        .query_map(params![build_num], |row| {
          Ok(Artifact {
            url: row.get(0)?,
            build_num: row.get(1)?,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(artifacts)
    })
  }
}
