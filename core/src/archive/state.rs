// keel/src/archive/state.rs

//! The data an archive report works with, and the fetch primitive it
//! consumes. Fetching and parsing archive state is the fetcher's business.

use async_trait::async_trait;
use std::fmt;

/// Identifies one remote history archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveDescriptor {
  name: String,
}

impl ArchiveDescriptor {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for ArchiveDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

/// The part of an archive's published state the report cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryArchiveState {
  /// Identity of the server that published the state.
  pub server: String,
  /// Latest sequence number the archive reports.
  pub current_ledger: u32,
}

#[async_trait]
pub trait ArchiveStateFetcher: Send + Sync {
  async fn fetch(&self, archive: &ArchiveDescriptor) -> anyhow::Result<HistoryArchiveState>;
}
