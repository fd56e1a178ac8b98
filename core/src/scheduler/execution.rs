// keel/src/scheduler/execution.rs

//! Contains `Scheduler`, the loop that drives one work tree to a terminal
//! state.

use crate::config::SchedulerConfig;
use crate::core::retry::RetryPolicy;
use crate::core::state::WorkState;
use crate::error::{KeelError, KeelResult};
use crate::scheduler::tree::WorkTree;
use crate::scheduler::wake::AbortHandle;
use crate::work::definition::Work;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Drives a single `WorkTree` by cooperative polling.
///
/// Each scheduler owns exactly one tree. Hosts that want several trees in
/// flight run several schedulers, e.g. one per task; trees share no
/// mutable state.
pub struct Scheduler {
  tree: WorkTree,
  config: SchedulerConfig,
  abort: AbortHandle,
  cranks: u64,
}

impl Scheduler {
  pub fn new<W: Work>(name: impl Into<String>, retry_policy: RetryPolicy, work: W) -> Self {
    Self::with_config(SchedulerConfig::default(), name, retry_policy, work)
  }

  pub fn with_config<W: Work>(
    config: SchedulerConfig,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: W,
  ) -> Self {
    Self::from_tree(WorkTree::new(name, retry_policy, work), config)
  }

  /// Wraps an existing tree, e.g. one built with a custom clock.
  pub fn from_tree(tree: WorkTree, config: SchedulerConfig) -> Self {
    let abort = AbortHandle::new(Arc::clone(tree.wakes()));
    Self {
      tree,
      config,
      abort,
      cranks: 0,
    }
  }

  pub fn tree(&self) -> &WorkTree {
    &self.tree
  }

  pub fn tree_mut(&mut self) -> &mut WorkTree {
    &mut self.tree
  }

  pub fn into_tree(self) -> WorkTree {
    self.tree
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.config
  }

  /// Cranks performed so far.
  pub fn cranks(&self) -> u64 {
    self.cranks
  }

  pub fn abort_handle(&self) -> AbortHandle {
    self.abort.clone()
  }

  /// One scheduling round: honors a pending abort request, enforces the
  /// crank limit, then cranks the tree.
  pub fn crank_once(&mut self) -> KeelResult<WorkState> {
    let root = self.tree.root();
    if self.abort.is_requested() {
      let state = self.tree.state(root)?;
      if state.is_terminal() {
        return Ok(state);
      }
      event!(Level::INFO, root = %self.tree.root_name(), "Aborting work tree on request.");
      return self.tree.abort(root);
    }

    if let Some(limit) = self.config.max_cranks {
      if self.cranks >= limit {
        let err = KeelError::CrankLimitExceeded { limit };
        event!(Level::ERROR, error = %err, "Work tree did not finish in time.");
        return Err(err);
      }
    }

    self.cranks += 1;
    self.tree.crank()
  }

  /// Cranks until the root reaches a terminal state.
  ///
  /// Yields to the runtime between cranks while the root is `Running`. While
  /// it is `Waiting`, sleeps until the earliest backoff deadline or until a
  /// node is woken (or the abort handle fires), whichever comes first.
  #[instrument(
    name = "Scheduler::run",
    skip_all,
    fields(root = %self.tree.root_name()),
    err(Display)
  )]
  pub async fn run(&mut self) -> KeelResult<WorkState> {
    event!(Level::DEBUG, "Scheduler run starting.");
    loop {
      let state = self.crank_once()?;
      if state.is_terminal() {
        event!(Level::INFO, %state, cranks = self.cranks, "Work tree finished.");
        return Ok(state);
      }

      if state == WorkState::Running {
        tokio::task::yield_now().await;
        continue;
      }

      let wait = match self.tree.next_deadline() {
        Some(deadline) => deadline.saturating_duration_since(self.tree.clock().now()),
        None => self.config.idle_wait,
      };
      event!(Level::TRACE, wait_ms = wait.as_millis() as u64, "Root is waiting.");
      let wakes = Arc::clone(self.tree.wakes());
      tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = wakes.notified() => {}
      }
    }
  }
}
