// keel/src/work/context.rs

//! Defines `WorkContext`, the view of the tree a work gets while it is being
//! progressed or while one of its hooks runs.

use crate::core::retry::RetryPolicy;
use crate::core::state::WorkState;
use crate::error::{KeelError, KeelResult};
use crate::scheduler::tree::WorkTree;
use crate::work::definition::{ChildHandle, NodeId, Work};
use std::task::Waker;
use std::time::Instant;

/// Handed to `Work::do_work` (mutably) and to the hooks (shared).
///
/// Only the node's own children can be addressed through a context.
/// Spawning requires `&mut`, so hooks, which run after the node is terminal,
/// cannot add children.
pub struct WorkContext<'a> {
  tree: &'a mut WorkTree,
  node: NodeId,
  name: String,
  state: WorkState,
  retries: u32,
}

impl<'a> WorkContext<'a> {
  pub(crate) fn new(tree: &'a mut WorkTree, node: NodeId) -> KeelResult<Self> {
    let name = tree.name(node)?.to_string();
    let state = tree.state(node)?;
    let retries = tree.retries(node)?;
    Ok(Self {
      tree,
      node,
      name,
      state,
      retries,
    })
  }

  pub fn node(&self) -> NodeId {
    self.node
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// `Running` inside `do_work`; the terminal state inside the hooks.
  pub fn state(&self) -> WorkState {
    self.state
  }

  /// Retries already consumed by this node.
  pub fn retries(&self) -> u32 {
    self.retries
  }

  pub fn now(&self) -> Instant {
    self.tree.clock().now()
  }

  /// Waker that schedules this node for another poll. Hand it to whatever
  /// completes the external event the node is waiting on.
  pub fn waker(&self) -> Waker {
    self.tree.waker(self.node)
  }

  // --- Child composition ---

  pub fn spawn_child<W: Work>(
    &mut self,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: W,
  ) -> KeelResult<ChildHandle<W>> {
    self.tree.spawn(self.node, name, retry_policy, work)
  }

  pub fn spawn_boxed(
    &mut self,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: Box<dyn Work>,
  ) -> KeelResult<ChildHandle<dyn Work>> {
    self.tree.spawn_boxed(self.node, name, retry_policy, work)
  }

  /// Children in spawn order.
  pub fn children(&self) -> &[NodeId] {
    self.tree.children(self.node).unwrap_or_default()
  }

  pub fn child_state<W: ?Sized>(&self, child: &ChildHandle<W>) -> KeelResult<WorkState> {
    self.ensure_own_child(child.id())?;
    self.tree.state(child.id())
  }

  pub fn child_retries<W: ?Sized>(&self, child: &ChildHandle<W>) -> KeelResult<u32> {
    self.ensure_own_child(child.id())?;
    self.tree.retries(child.id())
  }

  /// Typed access to a child's work, e.g. to read the result it produced.
  pub fn child<W: Work>(&self, child: &ChildHandle<W>) -> KeelResult<&W> {
    self.ensure_own_child(child.id())?;
    self.tree.work::<W>(child.id())
  }

  pub fn abort_child<W: ?Sized>(&mut self, child: &ChildHandle<W>) -> KeelResult<WorkState> {
    self.ensure_own_child(child.id())?;
    self.tree.abort(child.id())
  }

  // --- Aggregate queries ---

  /// True iff every spawned child is terminal. Vacuously true without children.
  pub fn all_children_done(&self) -> bool {
    self.child_states().all(WorkState::is_terminal)
  }

  /// True iff at least one child is `Running` (as opposed to `Waiting`).
  pub fn any_child_running(&self) -> bool {
    self.child_states().any(|state| state == WorkState::Running)
  }

  /// True iff every spawned child ended in `Success`. Vacuously true without children.
  pub fn all_children_successful(&self) -> bool {
    self.child_states().all(|state| state == WorkState::Success)
  }

  pub fn any_child_failed(&self) -> bool {
    self.child_states().any(|state| state == WorkState::Failure)
  }

  pub fn any_child_aborted(&self) -> bool {
    self.child_states().any(|state| state == WorkState::Aborted)
  }

  fn child_states(&self) -> impl Iterator<Item = WorkState> + '_ {
    self
      .children()
      .iter()
      .filter_map(move |child| self.tree.state(*child).ok())
  }

  fn ensure_own_child(&self, child: NodeId) -> KeelResult<()> {
    if self.tree.parent(child)? == Some(self.node) {
      Ok(())
    } else {
      Err(KeelError::ContractViolation {
        name: self.name.clone(),
        message: format!("node {} is not a child of this work", child),
      })
    }
  }
}
