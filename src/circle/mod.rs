//! CircleCI provider access: wire types, domain types and the HTTP client.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use client::{CiApi, CircleClient};
pub use types::{Artifact, Build};
