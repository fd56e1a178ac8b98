// keel/src/work/fan_out.rs

//! The fan-out/fan-in aggregation shared by composite works.

use crate::core::state::WorkState;
use crate::error::{KeelError, KeelResult};
use crate::work::context::WorkContext;
use crate::work::definition::ChildHandle;
use tracing::{event, Level};

/// Spawns a batch of children once and folds their terminal states into the
/// owning node's state.
///
/// Checks run in a fixed order on every poll: spawn (first poll only),
/// all-done, any-running, otherwise waiting. Spawning falls through to the
/// all-done check, so an empty batch resolves `Success` on the first poll.
/// A parent whose outstanding children are all waiting reports `Waiting`,
/// which keeps it idle until one of them is woken. Resolving `Failure`
/// requires at least one child in `Failure`; children aborted out from under
/// the batch are a contract violation.
pub struct FanOut<W: ?Sized> {
  spawned: bool,
  handles: Vec<ChildHandle<W>>,
}

impl<W: ?Sized> FanOut<W> {
  pub fn new() -> Self {
    Self {
      spawned: false,
      handles: Vec::new(),
    }
  }

  pub fn is_spawned(&self) -> bool {
    self.spawned
  }

  /// Handles in spawn order.
  pub fn handles(&self) -> &[ChildHandle<W>] {
    &self.handles
  }

  /// Forget the spawned batch. Call from `Work::on_reset` so a retry spawns
  /// a fresh one.
  pub fn reset(&mut self) {
    self.spawned = false;
    self.handles.clear();
  }

  pub fn poll<F>(&mut self, cx: &mut WorkContext<'_>, spawn_all: F) -> KeelResult<WorkState>
  where
    F: FnOnce(&mut WorkContext<'_>) -> KeelResult<Vec<ChildHandle<W>>>,
  {
    if !self.spawned {
      self.handles = spawn_all(cx)?;
      self.spawned = true;
      event!(Level::DEBUG, work = %cx.name(), children = self.handles.len(), "Fan-out children spawned.");
    }

    if cx.all_children_done() {
      if cx.all_children_successful() {
        return Ok(WorkState::Success);
      }
      if !cx.any_child_failed() {
        let err = KeelError::ContractViolation {
          name: cx.name().to_string(),
          message: "aggregate failure without any failed child".to_string(),
        };
        event!(Level::ERROR, error = %err, "Fan-out aggregation is inconsistent.");
        return Err(err);
      }
      return Ok(WorkState::Failure);
    }

    if cx.any_child_running() {
      return Ok(WorkState::Running);
    }

    Ok(WorkState::Waiting)
  }
}

impl<W: ?Sized> Default for FanOut<W> {
  fn default() -> Self {
    Self::new()
  }
}
