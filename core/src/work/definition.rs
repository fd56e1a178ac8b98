// keel/src/work/definition.rs

//! The `Work` capability set implemented by every task variant, plus the
//! identifiers used to address nodes inside a `WorkTree`.

use crate::core::state::WorkState;
use crate::work::context::WorkContext;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Address of a node inside a `WorkTree`.
///
/// Slots are reused once a node is released; the generation makes a handle
/// to a released node fail lookups instead of aliasing the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
  pub(crate) index: usize,
  pub(crate) generation: u64,
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}v{}", self.index, self.generation)
  }
}

/// Typed handle to a child node, returned by `spawn_child`.
///
/// `W` records the concrete work type so the parent can read the child's
/// results back through `WorkContext::child`. Untyped children spawned with
/// `spawn_boxed` use `ChildHandle<dyn Work>`.
pub struct ChildHandle<W: ?Sized> {
  id: NodeId,
  _phantom_work: PhantomData<fn() -> Box<W>>,
}

impl<W: ?Sized> ChildHandle<W> {
  pub(crate) fn new(id: NodeId) -> Self {
    Self {
      id,
      _phantom_work: PhantomData,
    }
  }

  pub fn id(&self) -> NodeId {
    self.id
  }
}

impl<W: ?Sized> Clone for ChildHandle<W> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<W: ?Sized> Copy for ChildHandle<W> {}

impl<W: ?Sized> fmt::Debug for ChildHandle<W> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChildHandle")
      .field("id", &self.id)
      .field("work_type", &std::any::type_name::<W>())
      .finish()
  }
}

/// Lets the tree hand a `&dyn Work` back to callers as its concrete type.
pub trait AsAny: Any {
  fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// A schedulable unit of asynchronous work.
///
/// `do_work` is the progress function. It performs at most one bounded
/// increment of work and must never block: when it cannot progress
/// synchronously it returns `WorkState::Waiting` and relies on its waker
/// (see `WorkContext::waker`) or a backoff timer to be polled again.
///
/// Returning `WorkState::Failure` or an `Err` marks the attempt as failed;
/// the node's `RetryPolicy` decides whether it is retried. Returning
/// `WorkState::Aborted` is a contract violation.
///
/// Exactly one of `on_success`, `on_failure_raise` and `on_abort` is called,
/// once, after the node reaches its terminal state.
pub trait Work: AsAny + Send {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState>;

  /// Clear transient attempt state before a retry. Children are already
  /// released when this runs.
  fn on_reset(&mut self) {}

  fn on_failure_retry(&mut self, _cx: &WorkContext<'_>) {}

  fn on_failure_raise(&mut self, _cx: &WorkContext<'_>) {}

  fn on_success(&mut self, _cx: &WorkContext<'_>) {}

  fn on_abort(&mut self, _cx: &WorkContext<'_>) {}
}
