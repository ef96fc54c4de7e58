mod ledger;
pub mod schema;

pub use ledger::Ledger;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{SyncError, SyncResult};

/// Build store backed by a single SQLite connection.
///
/// Constructed once at startup and shared by reference with both background
/// loops and the HTTP handlers. Every call on the store commits on its own;
/// use [`Store::transaction`] to batch writes.
pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Open or create the ledger at `path`
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Throwaway ledger for tests
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| SyncError::StoreUnavailable)
  }

  /// Run `f` inside one transaction.
  ///
  /// Commits when `f` returns `Ok`; any error rolls back every write made
  /// through the handle. The store lock is held until then, so `f` must not
  /// do anything slower than SQL.
  pub fn transaction<T, F>(&self, f: F) -> SyncResult<T>
  where
    F: FnOnce(&StoreTx<'_>) -> SyncResult<T>,
  {
    let mut conn = self.lock()?;
    let tx = StoreTx {
      tx: conn.transaction()?,
    };

    let value = f(&tx)?;
    tx.tx.commit()?;
    Ok(value)
  }
}

impl Ledger for Store {
  fn with_conn<T, F>(&self, f: F) -> SyncResult<T>
  where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
  {
    let conn = self.lock()?;
    Ok(f(&*conn)?)
  }
}

/// Ledger handle whose writes land together when the transaction commits
pub struct StoreTx<'conn> {
  tx: Transaction<'conn>,
}

impl Ledger for StoreTx<'_> {
  fn with_conn<T, F>(&self, f: F) -> SyncResult<T>
  where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
  {
    Ok(f(&*self.tx)?)
  }
}
