// keel/src/error.rs
use crate::core::state::WorkState;
use crate::work::definition::NodeId;
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeelError {
  #[error("Work node {node} not found (stale or released handle)")]
  NodeNotFound { node: NodeId },

  #[error("Cannot spawn child '{child}' under '{parent}' while it is {state}")]
  SpawnOutsideRunning {
    parent: String,
    child: String,
    state: WorkState,
  },

  #[error("Contract violation in work '{name}': {message}")]
  ContractViolation { name: String, message: String },

  #[error("Type mismatch for work node {node} (expected {expected_type})")]
  TypeMismatch { node: NodeId, expected_type: String },

  #[error("Scheduler exceeded its limit of {limit} cranks before the root reached a terminal state")]
  CrankLimitExceeded { limit: u64 },

  #[error("Configuration error for '{key}': {message}")]
  Configuration { key: String, message: String },

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Error in user-provided work or external operation. Source: {source}")]
  WorkFailed {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal keel error: {0}")]
  Internal(String),
}

impl KeelError {
  /// Programming errors in how work is composed. These are surfaced to the
  /// caller of `progress`/`run` and never turned into a node failure.
  pub fn is_contract_breach(&self) -> bool {
    matches!(
      self,
      KeelError::NodeNotFound { .. }
        | KeelError::SpawnOutsideRunning { .. }
        | KeelError::ContractViolation { .. }
        | KeelError::TypeMismatch { .. }
        | KeelError::Internal(_)
    )
  }
}

impl From<AnyhowError> for KeelError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a KeelError that travelled through user code via `?`
    // instead of nesting it inside WorkFailed.
    match err.downcast::<KeelError>() {
      Ok(keel_err) => keel_err,
      Err(other) => KeelError::WorkFailed { source: other },
    }
  }
}

pub type KeelResult<T, E = KeelError> = std::result::Result<T, E>;
