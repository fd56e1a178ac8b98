// keel/src/scheduler/tree.rs

//! Defines `WorkTree`, the arena that owns every node of one work hierarchy
//! and implements the progress, retry, abort and wake-up rules.
//!
//! Ownership runs strictly downwards: a parent record holds the ids of its
//! children, a child holds its parent's id only to look it up. Releasing a
//! node releases its whole subtree.

use crate::core::clock::{Clock, SystemClock};
use crate::core::retry::RetryPolicy;
use crate::core::state::WorkState;
use crate::error::{KeelError, KeelResult};
use crate::scheduler::wake::{node_waker, WakeQueue};
use crate::work::context::WorkContext;
use crate::work::definition::{ChildHandle, NodeId, Work};
use std::fmt;
use std::sync::Arc;
use std::task::Waker;
use std::time::Instant;
use tracing::{event, span, Level};

struct NodeRecord {
  generation: u64,
  name: String,
  state: WorkState,
  retry_policy: RetryPolicy,
  retries: u32,
  retry_at: Option<Instant>,
  parent: Option<NodeId>,
  children: Vec<NodeId>,
  // None only while the node's own do_work or hook is running.
  work: Option<Box<dyn Work>>,
}

pub struct WorkTree {
  slots: Vec<Option<NodeRecord>>,
  free: Vec<usize>,
  next_generation: u64,
  root: NodeId,
  clock: Arc<dyn Clock>,
  wakes: Arc<WakeQueue>,
}

impl WorkTree {
  /// Creates a tree whose root runs `work`, timed by the system clock.
  pub fn new<W: Work>(name: impl Into<String>, retry_policy: RetryPolicy, work: W) -> Self {
    Self::with_clock(Arc::new(SystemClock), name, retry_policy, work)
  }

  pub fn with_clock<W: Work>(
    clock: Arc<dyn Clock>,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: W,
  ) -> Self {
    let mut tree = Self {
      slots: Vec::new(),
      free: Vec::new(),
      next_generation: 0,
      root: NodeId { index: 0, generation: 0 },
      clock,
      wakes: Arc::new(WakeQueue::default()),
    };
    tree.root = tree.insert(name.into(), retry_policy, None, Box::new(work));
    event!(Level::DEBUG, root = %tree.root, "Work tree created.");
    tree
  }

  // --- Node construction ---

  /// Creates a child of `parent`. The parent must be `Running`.
  pub fn spawn<W: Work>(
    &mut self,
    parent: NodeId,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: W,
  ) -> KeelResult<ChildHandle<W>> {
    let handle = self.spawn_boxed(parent, name, retry_policy, Box::new(work))?;
    Ok(ChildHandle::new(handle.id()))
  }

  pub fn spawn_boxed(
    &mut self,
    parent: NodeId,
    name: impl Into<String>,
    retry_policy: RetryPolicy,
    work: Box<dyn Work>,
  ) -> KeelResult<ChildHandle<dyn Work>> {
    let name = name.into();
    let parent_record = self.record(parent)?;
    if parent_record.state != WorkState::Running {
      let err = KeelError::SpawnOutsideRunning {
        parent: parent_record.name.clone(),
        child: name,
        state: parent_record.state,
      };
      event!(Level::ERROR, error = %err, "Refusing to spawn child.");
      return Err(err);
    }

    let id = self.insert(name, retry_policy, Some(parent), work);
    self.record_mut(parent)?.children.push(id);
    event!(Level::DEBUG, %parent, child = %id, ?retry_policy, "Child spawned.");
    Ok(ChildHandle::new(id))
  }

  fn insert(
    &mut self,
    name: String,
    retry_policy: RetryPolicy,
    parent: Option<NodeId>,
    work: Box<dyn Work>,
  ) -> NodeId {
    self.next_generation += 1;
    let record = NodeRecord {
      generation: self.next_generation,
      name,
      state: WorkState::Running,
      retry_policy,
      retries: 0,
      retry_at: None,
      parent,
      children: Vec::new(),
      work: Some(work),
    };
    let index = match self.free.pop() {
      Some(index) => {
        self.slots[index] = Some(record);
        index
      }
      None => {
        self.slots.push(Some(record));
        self.slots.len() - 1
      }
    };
    NodeId {
      index,
      generation: self.next_generation,
    }
  }

  // --- Driving ---

  /// Applies pending wake-ups and elapsed backoff deadlines, then progresses
  /// the root once.
  pub fn crank(&mut self) -> KeelResult<WorkState> {
    let now = self.clock.now();
    self.apply_wakes(now);
    self.progress(self.root)
  }

  /// Progresses one node.
  ///
  /// Terminal and waiting nodes are returned untouched. A running node first
  /// progresses each of its running children once, in spawn order, and then
  /// runs its own `do_work` once.
  pub fn progress(&mut self, id: NodeId) -> KeelResult<WorkState> {
    let record = self.record(id)?;
    if record.state != WorkState::Running {
      return Ok(record.state);
    }

    let work_span = span!(Level::DEBUG, "work_progress", node = %id, work = %record.name);
    let _work_span_guard = work_span.enter();

    let children = record.children.clone();
    for child in children {
      if self.record(child)?.state == WorkState::Running {
        self.progress(child)?;
      }
    }

    let mut work = self.checkout(id)?;
    let result = self.step(id, &mut *work);
    self.restore(id, work);
    result
  }

  fn step(&mut self, id: NodeId, work: &mut dyn Work) -> KeelResult<WorkState> {
    let outcome = {
      let mut cx = WorkContext::new(self, id)?;
      work.do_work(&mut cx)
    };

    match outcome {
      Ok(WorkState::Running) => self.set_state(id, WorkState::Running),
      Ok(WorkState::Waiting) => {
        event!(Level::TRACE, "Work is waiting.");
        self.set_state(id, WorkState::Waiting)
      }
      Ok(WorkState::Success) => {
        if !self.all_children_done(id)? {
          return Err(self.contract_violation(id, "reported SUCCESS while children are still unresolved"));
        }
        self.finish(id, work, WorkState::Success)
      }
      Ok(WorkState::Failure) => self.fail_attempt(id, work, None),
      Ok(WorkState::Aborted) => Err(self.contract_violation(
        id,
        "do_work reported ABORTED; aborting goes through WorkTree::abort",
      )),
      Err(err) => match err.downcast::<KeelError>() {
        Ok(keel_err) if keel_err.is_contract_breach() => {
          event!(Level::ERROR, error = %keel_err, "Contract breach raised from work.");
          Err(keel_err)
        }
        Ok(keel_err) => self.fail_attempt(id, work, Some(anyhow::Error::new(keel_err))),
        Err(other) => self.fail_attempt(id, work, Some(other)),
      },
    }
  }

  fn fail_attempt(&mut self, id: NodeId, work: &mut dyn Work, cause: Option<anyhow::Error>) -> KeelResult<WorkState> {
    match &cause {
      Some(cause) => {
        let cause_text = format!("{:#}", cause);
        event!(Level::WARN, error = %cause_text, "Work attempt failed.");
      }
      None => event!(Level::WARN, "Work attempt reported failure."),
    }

    // A node never resolves or resets over live children.
    self.abort_children(id)?;

    let record = self.record(id)?;
    let retry_policy = record.retry_policy;
    let retries = record.retries;
    if !retry_policy.allows_retry(retries) {
      return self.finish(id, work, WorkState::Failure);
    }

    let attempt = retries + 1;
    let delay = retry_policy.delay_for_attempt(attempt);
    let retry_at = self
      .clock
      .now()
      .checked_add(delay)
      .ok_or_else(|| KeelError::Configuration {
        key: "retry_policy".to_string(),
        message: format!("backoff of {:?} overflows the clock", delay),
      })?;
    {
      let cx = WorkContext::new(self, id)?;
      work.on_failure_retry(&cx);
    }
    self.release_children(id);
    work.on_reset();

    let record = self.record_mut(id)?;
    record.retries = attempt;
    record.retry_at = Some(retry_at);
    record.state = WorkState::Waiting;
    event!(
      Level::WARN,
      attempt = attempt,
      max_retries = ?retry_policy.max_retries(),
      delay_ms = delay.as_millis() as u64,
      "Retry scheduled after backoff."
    );
    Ok(WorkState::Waiting)
  }

  /// Sets the terminal state, fires the matching hook once, then releases
  /// the children. Ancestors can only observe the state after the hook.
  fn finish(&mut self, id: NodeId, work: &mut dyn Work, terminal: WorkState) -> KeelResult<WorkState> {
    let record = self.record_mut(id)?;
    record.state = terminal;
    record.retry_at = None;
    {
      let cx = WorkContext::new(self, id)?;
      match terminal {
        WorkState::Success => work.on_success(&cx),
        WorkState::Failure => work.on_failure_raise(&cx),
        _ => work.on_abort(&cx),
      }
    }
    self.release_children(id);

    match terminal {
      WorkState::Success => event!(Level::INFO, node = %id, "Work succeeded."),
      WorkState::Failure => event!(Level::WARN, node = %id, "Work failed."),
      _ => event!(Level::INFO, node = %id, "Work aborted."),
    }
    Ok(terminal)
  }

  // --- Cancellation ---

  /// Aborts a node and everything below it.
  ///
  /// Non-terminal children are aborted depth-first, in spawn order, before
  /// the node itself becomes `Aborted`. A terminal node ignores the abort.
  pub fn abort(&mut self, id: NodeId) -> KeelResult<WorkState> {
    let state = self.state(id)?;
    if state.is_terminal() {
      event!(Level::TRACE, node = %id, %state, "Abort ignored for terminal work.");
      return Ok(state);
    }

    self.abort_children(id)?;
    let mut work = self.checkout(id)?;
    let result = self.finish(id, &mut *work, WorkState::Aborted);
    self.restore(id, work);
    result
  }

  fn abort_children(&mut self, id: NodeId) -> KeelResult<()> {
    let children = self.record(id)?.children.clone();
    for child in children {
      self.abort(child)?;
    }
    Ok(())
  }

  // --- Wake-ups ---

  fn apply_wakes(&mut self, now: Instant) {
    for id in self.wakes.drain() {
      // A node sitting out a backoff only wakes when the deadline passes.
      let eligible = self
        .record(id)
        .is_ok_and(|record| record.state == WorkState::Waiting && record.retry_at.is_none());
      if eligible {
        self.wake_up(id);
      }
    }

    let due: Vec<NodeId> = self
      .live_nodes()
      .filter(|(_, record)| {
        record.state == WorkState::Waiting && record.retry_at.is_some_and(|retry_at| retry_at <= now)
      })
      .map(|(id, _)| id)
      .collect();
    for id in due {
      if let Ok(record) = self.record_mut(id) {
        record.retry_at = None;
      }
      event!(Level::DEBUG, node = %id, "Backoff elapsed, retrying.");
      self.wake_up(id);
    }
  }

  /// Makes a waiting node runnable again, together with every waiting
  /// ancestor, so the path from the root down to it gets polled.
  fn wake_up(&mut self, id: NodeId) {
    let mut current = Some(id);
    while let Some(node) = current {
      match self.record_mut(node) {
        Ok(record) if record.state == WorkState::Waiting => {
          record.state = WorkState::Running;
          current = record.parent;
        }
        _ => break,
      }
    }
  }

  /// Earliest pending backoff deadline in the tree.
  pub fn next_deadline(&self) -> Option<Instant> {
    self
      .live_nodes()
      .filter(|(_, record)| record.state == WorkState::Waiting)
      .filter_map(|(_, record)| record.retry_at)
      .min()
  }

  pub fn waker(&self, id: NodeId) -> Waker {
    node_waker(id, Arc::clone(&self.wakes))
  }

  pub(crate) fn wakes(&self) -> &Arc<WakeQueue> {
    &self.wakes
  }

  // --- Queries ---

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn root_name(&self) -> &str {
    self.name(self.root).unwrap_or_default()
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  /// Number of live nodes, root included.
  pub fn node_count(&self) -> usize {
    self.live_nodes().count()
  }

  pub fn state(&self, id: NodeId) -> KeelResult<WorkState> {
    Ok(self.record(id)?.state)
  }

  pub fn name(&self, id: NodeId) -> KeelResult<&str> {
    Ok(&self.record(id)?.name)
  }

  pub fn retries(&self, id: NodeId) -> KeelResult<u32> {
    Ok(self.record(id)?.retries)
  }

  pub fn retry_at(&self, id: NodeId) -> KeelResult<Option<Instant>> {
    Ok(self.record(id)?.retry_at)
  }

  pub fn retry_policy(&self, id: NodeId) -> KeelResult<RetryPolicy> {
    Ok(self.record(id)?.retry_policy)
  }

  pub fn parent(&self, id: NodeId) -> KeelResult<Option<NodeId>> {
    Ok(self.record(id)?.parent)
  }

  pub fn children(&self, id: NodeId) -> KeelResult<&[NodeId]> {
    Ok(&self.record(id)?.children)
  }

  /// The node's work as its concrete type.
  pub fn work<W: Work>(&self, id: NodeId) -> KeelResult<&W> {
    let record = self.record(id)?;
    let work = record
      .work
      .as_deref()
      .ok_or_else(|| KeelError::Internal(format!("work '{}' is checked out for progress", record.name)))?;
    work
      .as_any()
      .downcast_ref::<W>()
      .ok_or_else(|| KeelError::TypeMismatch {
        node: id,
        expected_type: std::any::type_name::<W>().to_string(),
      })
  }

  pub fn all_children_done(&self, id: NodeId) -> KeelResult<bool> {
    Ok(self.child_states(id)?.all(WorkState::is_terminal))
  }

  pub fn any_child_running(&self, id: NodeId) -> KeelResult<bool> {
    Ok(self.child_states(id)?.any(|state| state == WorkState::Running))
  }

  pub fn all_children_successful(&self, id: NodeId) -> KeelResult<bool> {
    Ok(self.child_states(id)?.all(|state| state == WorkState::Success))
  }

  pub fn any_child_failed(&self, id: NodeId) -> KeelResult<bool> {
    Ok(self.child_states(id)?.any(|state| state == WorkState::Failure))
  }

  fn child_states(&self, id: NodeId) -> KeelResult<impl Iterator<Item = WorkState> + '_> {
    let children = &self.record(id)?.children;
    Ok(children.iter().filter_map(move |child| self.record(*child).ok().map(|record| record.state)))
  }

  // --- Arena plumbing ---

  fn record(&self, id: NodeId) -> KeelResult<&NodeRecord> {
    self
      .slots
      .get(id.index)
      .and_then(Option::as_ref)
      .filter(|record| record.generation == id.generation)
      .ok_or(KeelError::NodeNotFound { node: id })
  }

  fn record_mut(&mut self, id: NodeId) -> KeelResult<&mut NodeRecord> {
    self
      .slots
      .get_mut(id.index)
      .and_then(Option::as_mut)
      .filter(|record| record.generation == id.generation)
      .ok_or(KeelError::NodeNotFound { node: id })
  }

  fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> + '_ {
    self.slots.iter().enumerate().filter_map(|(index, slot)| {
      slot.as_ref().map(|record| {
        (
          NodeId {
            index,
            generation: record.generation,
          },
          record,
        )
      })
    })
  }

  fn set_state(&mut self, id: NodeId, state: WorkState) -> KeelResult<WorkState> {
    self.record_mut(id)?.state = state;
    Ok(state)
  }

  fn checkout(&mut self, id: NodeId) -> KeelResult<Box<dyn Work>> {
    let record = self.record_mut(id)?;
    record
      .work
      .take()
      .ok_or_else(|| KeelError::Internal(format!("work '{}' re-entered while already in progress", record.name)))
  }

  fn restore(&mut self, id: NodeId, work: Box<dyn Work>) {
    if let Ok(record) = self.record_mut(id) {
      record.work = Some(work);
    }
  }

  fn release_children(&mut self, id: NodeId) {
    let children = match self.record_mut(id) {
      Ok(record) => std::mem::take(&mut record.children),
      Err(_) => return,
    };
    for child in children {
      self.release(child);
    }
  }

  fn release(&mut self, id: NodeId) {
    self.release_children(id);
    if let Some(slot) = self.slots.get_mut(id.index) {
      if slot.as_ref().is_some_and(|record| record.generation == id.generation) {
        *slot = None;
        self.free.push(id.index);
      }
    }
  }

  fn contract_violation(&self, id: NodeId, message: &str) -> KeelError {
    let name = self
      .record(id)
      .map(|record| record.name.clone())
      .unwrap_or_else(|_| id.to_string());
    let err = KeelError::ContractViolation {
      name,
      message: message.to_string(),
    };
    event!(Level::ERROR, error = %err, "Contract violation.");
    err
  }
}

impl fmt::Debug for WorkTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkTree")
      .field("root", &self.root)
      .field("root_name", &self.root_name())
      .field("node_count", &self.node_count())
      .field("clock", &self.clock)
      .finish()
  }
}
