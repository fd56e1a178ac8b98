// keel/src/archive/get_state.rs

use crate::archive::state::{ArchiveDescriptor, ArchiveStateFetcher, HistoryArchiveState};
use crate::core::state::WorkState;
use crate::work::adapters::{BoxWorkFuture, PendingFuture};
use crate::work::context::WorkContext;
use crate::work::definition::Work;
use std::sync::Arc;
use std::task::Poll;
use tracing::{event, Level};

/// Leaf work fetching the state of a single archive.
///
/// Reports `Waiting` while the fetch is in flight; the fetch future wakes the
/// node when it can make progress.
pub struct GetArchiveStateWork {
  archive: ArchiveDescriptor,
  fetcher: Arc<dyn ArchiveStateFetcher>,
  pending: PendingFuture<HistoryArchiveState>,
  archive_state: Option<HistoryArchiveState>,
}

impl GetArchiveStateWork {
  pub fn new(archive: ArchiveDescriptor, fetcher: Arc<dyn ArchiveStateFetcher>) -> Self {
    Self {
      archive,
      fetcher,
      pending: PendingFuture::new(),
      archive_state: None,
    }
  }

  pub fn archive(&self) -> &ArchiveDescriptor {
    &self.archive
  }

  /// Set once the work succeeded.
  pub fn archive_state(&self) -> Option<&HistoryArchiveState> {
    self.archive_state.as_ref()
  }
}

impl Work for GetArchiveStateWork {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    let fetcher = Arc::clone(&self.fetcher);
    let archive = self.archive.clone();
    let polled = self
      .pending
      .poll_with(cx, move || -> BoxWorkFuture<HistoryArchiveState> {
        Box::pin(async move { fetcher.fetch(&archive).await })
      });

    match polled {
      Poll::Pending => Ok(WorkState::Waiting),
      Poll::Ready(Ok(archive_state)) => {
        event!(
          Level::DEBUG,
          archive = %self.archive,
          server = %archive_state.server,
          current_ledger = archive_state.current_ledger,
          "Archive state fetched."
        );
        self.archive_state = Some(archive_state);
        Ok(WorkState::Success)
      }
      Poll::Ready(Err(err)) => Err(err.context(format!("could not fetch state of archive '{}'", self.archive))),
    }
  }

  fn on_reset(&mut self) {
    self.pending.reset();
    self.archive_state = None;
  }
}
