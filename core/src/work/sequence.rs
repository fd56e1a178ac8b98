// keel/src/work/sequence.rs

//! Runs a list of works one after another, each as a child of the sequence.

use crate::core::retry::RetryPolicy;
use crate::core::state::WorkState;
use crate::work::context::WorkContext;
use crate::work::definition::{ChildHandle, Work};
use tracing::{event, Level};

type StepFactory = Box<dyn Fn() -> Box<dyn Work> + Send>;

struct SequenceStep {
  name: String,
  retry_policy: RetryPolicy,
  factory: StepFactory,
}

/// Steps are created from factories so a retried sequence starts over with
/// fresh works. A step that ends in anything but `Success` fails the
/// sequence; later steps are never spawned.
pub struct WorkSequence {
  steps: Vec<SequenceStep>,
  next: usize,
  current: Option<ChildHandle<dyn Work>>,
}

impl WorkSequence {
  pub fn new() -> Self {
    Self {
      steps: Vec::new(),
      next: 0,
      current: None,
    }
  }

  /// Appends a step built by `factory` each time the sequence reaches it.
  pub fn step<W, F>(mut self, name: impl Into<String>, retry_policy: RetryPolicy, factory: F) -> Self
  where
    W: Work,
    F: Fn() -> W + Send + 'static,
  {
    self.steps.push(SequenceStep {
      name: name.into(),
      retry_policy,
      factory: Box::new(move || Box::new(factory()) as Box<dyn Work>),
    });
    self
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Steps that finished successfully in the current attempt.
  pub fn completed_steps(&self) -> usize {
    self.next
  }
}

impl Default for WorkSequence {
  fn default() -> Self {
    Self::new()
  }
}

impl Work for WorkSequence {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    if let Some(current) = self.current {
      match cx.child_state(&current)? {
        WorkState::Success => {
          self.next += 1;
          self.current = None;
        }
        WorkState::Failure | WorkState::Aborted => return Ok(WorkState::Failure),
        pending => return Ok(pending),
      }
    }

    let Some(step) = self.steps.get(self.next) else {
      return Ok(WorkState::Success);
    };
    event!(Level::DEBUG, sequence = %cx.name(), step = %step.name, index = self.next, "Starting sequence step.");
    self.current = Some(cx.spawn_boxed(step.name.clone(), step.retry_policy, (step.factory)())?);
    Ok(WorkState::Running)
  }

  fn on_reset(&mut self) {
    self.next = 0;
    self.current = None;
  }
}
