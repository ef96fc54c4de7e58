//! Error types for the build/artifact synchronization engine.
//!
//! The engine never retries internally. Every variant is surfaced to the loop
//! (or request) that started the work, which logs it and waits for its next
//! trigger.

use thiserror::Error;

/// Result type alias for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
  /// Network or HTTP failure reaching the CI provider
  #[error("CI request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The CI provider answered with something we could not decode
  #[error("Failed to decode CI response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Build store error: {0}")]
  Store(#[from] rusqlite::Error),

  #[error("Build store unavailable: lock poisoned")]
  StoreUnavailable,

  /// The build list ran dry before we saw the cursor build again
  #[error("Ran out of builds during a refresh before reaching build {cursor}")]
  Consistency { cursor: i64 },

  #[error("Build ledger needs a bootstrap; rerun with --bootstrap")]
  NeedsBootstrap,
}
