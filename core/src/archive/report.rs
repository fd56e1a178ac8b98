// keel/src/archive/report.rs

//! `ArchiveReportWork` asks every configured archive for its state and
//! reports what the reachable ones publish.

use crate::archive::get_state::GetArchiveStateWork;
use crate::archive::state::{ArchiveDescriptor, ArchiveStateFetcher};
use crate::core::retry::RetryPolicy;
use crate::core::state::WorkState;
use crate::work::context::WorkContext;
use crate::work::definition::Work;
use crate::work::fan_out::FanOut;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{event, Level};

/// Receives the formatted report lines.
pub trait ReportSink: Send + Sync {
  fn emit(&self, line: &str);
}

/// Forwards report lines to `tracing` at INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
  fn emit(&self, line: &str) {
    event!(target: "keel::archive", Level::INFO, "{}", line);
  }
}

/// Keeps report lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  lines: Mutex<Vec<String>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().clone()
  }
}

impl ReportSink for MemorySink {
  fn emit(&self, line: &str) {
    self.lines.lock().push(line.to_string());
  }
}

/// Fans out one `GetArchiveStateWork` per archive, each with
/// `RetryPolicy::Never`, and succeeds only if every archive answered.
///
/// Whatever the outcome, one line is reported per archive that answered, in
/// the order the archives were given.
pub struct ArchiveReportWork {
  archives: Vec<ArchiveDescriptor>,
  fetcher: Arc<dyn ArchiveStateFetcher>,
  sink: Arc<dyn ReportSink>,
  fan_out: FanOut<GetArchiveStateWork>,
}

impl ArchiveReportWork {
  pub const NAME: &'static str = "history-archive-report-work";

  pub fn new(
    archives: Vec<ArchiveDescriptor>,
    fetcher: Arc<dyn ArchiveStateFetcher>,
    sink: Arc<dyn ReportSink>,
  ) -> Self {
    Self {
      archives,
      fetcher,
      sink,
      fan_out: FanOut::new(),
    }
  }

  pub fn with_tracing_sink(archives: Vec<ArchiveDescriptor>, fetcher: Arc<dyn ArchiveStateFetcher>) -> Self {
    Self::new(archives, fetcher, Arc::new(TracingSink))
  }

  pub fn archives(&self) -> &[ArchiveDescriptor] {
    &self.archives
  }

  fn log_reports(&self, cx: &WorkContext<'_>) {
    for handle in self.fan_out.handles() {
      let child = match cx.child(handle) {
        Ok(child) => child,
        Err(err) => {
          event!(Level::ERROR, error = %err, "Archive fetch result unavailable.");
          continue;
        }
      };
      match (cx.child_state(handle), child.archive_state()) {
        (Ok(WorkState::Success), Some(archive_state)) => {
          self.sink.emit(&format!(
            "Archive information: [name: {}, server: {}, currentLedger: {}]",
            child.archive(),
            archive_state.server,
            archive_state.current_ledger
          ));
        }
        (state, _) => {
          event!(Level::WARN, archive = %child.archive(), state = ?state.ok(), "Archive did not report its state.");
        }
      }
    }
  }
}

impl Work for ArchiveReportWork {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    let archives = &self.archives;
    let fetcher = &self.fetcher;
    let state = self.fan_out.poll(cx, |cx| {
      archives
        .iter()
        .map(|archive| {
          cx.spawn_child(
            format!("archive-report-{}", archive.name()),
            RetryPolicy::Never,
            GetArchiveStateWork::new(archive.clone(), Arc::clone(fetcher)),
          )
        })
        .collect()
    })?;
    Ok(state)
  }

  fn on_reset(&mut self) {
    self.fan_out.reset();
  }

  fn on_success(&mut self, cx: &WorkContext<'_>) {
    self.log_reports(cx);
    event!(Level::INFO, "archive report succeeded for all archives");
  }

  fn on_failure_raise(&mut self, cx: &WorkContext<'_>) {
    self.log_reports(cx);
    event!(Level::INFO, "archive report failed for some archive(s)");
  }
}
