//! Build/artifact synchronization engine.
//!
//! - `refresh`: keeps the build ledger current (bootstrap or incremental)
//! - `artifacts`: write-once artifact cache keyed on build completion
//! - `workers`: the refresher and archiver background loops
//! - `signal`: coalescing wake-up from refresher to archiver

pub mod artifacts;
pub mod refresh;
pub mod signal;
pub mod workers;

pub use artifacts::artifacts_with_cache;
pub use refresh::{RefreshOutcome, Refresher};
pub use signal::archive_signal;
pub use workers::{run_archiver, run_refresher};
