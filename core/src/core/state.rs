// keel/src/core/state.rs

//! The state machine every work node moves through.

use std::fmt;

/// State of a single work node.
///
/// Every node starts `Running`. `Success`, `Failure` and `Aborted` are
/// terminal: once reached, the node is never polled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkState {
  /// Actively making progress, or has children that are.
  Running,
  /// Idle until an external event or a backoff timer wakes it.
  Waiting,
  /// All required conditions were met.
  Success,
  /// A fatal or retry-exhausted condition occurred.
  Failure,
  /// Cancelled by an ancestor or by the scheduler.
  Aborted,
}

impl WorkState {
  pub fn is_terminal(self) -> bool {
    matches!(self, WorkState::Success | WorkState::Failure | WorkState::Aborted)
  }
}

impl fmt::Display for WorkState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WorkState::Running => write!(f, "RUNNING"),
      WorkState::Waiting => write!(f, "WAITING"),
      WorkState::Success => write!(f, "SUCCESS"),
      WorkState::Failure => write!(f, "FAILURE"),
      WorkState::Aborted => write!(f, "ABORTED"),
    }
  }
}
