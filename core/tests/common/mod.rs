// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use keel::archive::{ArchiveDescriptor, ArchiveStateFetcher, HistoryArchiveState};
use keel::{FanOut, RetryPolicy, Work, WorkContext, WorkState, WorkTree};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Shared event log for hook ordering assertions ---
#[derive(Clone, Debug, Default)]
pub struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, entry: impl Into<String>) {
    self.0.lock().push(entry.into());
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }

  pub fn count(&self, entry: &str) -> usize {
    self.0.lock().iter().filter(|e| e.as_str() == entry).count()
  }

  pub fn contains(&self, entry: &str) -> bool {
    self.count(entry) > 0
  }

  /// Index of the first occurrence; panics if absent so ordering asserts fail loudly.
  pub fn position(&self, entry: &str) -> usize {
    self
      .0
      .lock()
      .iter()
      .position(|e| e == entry)
      .unwrap_or_else(|| panic!("'{}' not found in hook log", entry))
  }
}

// --- Scripted leaf work ---
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  Running,
  /// Waits for an external event that never comes unless the test wakes the node.
  Waiting,
  /// Waits, but wakes itself right away (like a future that yields once).
  WaitThenWake,
  Success,
  Failure,
  Error(&'static str),
}

#[derive(Debug)]
pub struct ScriptState {
  outcomes: Vec<Outcome>,
  cursor: usize,
}

/// A script shared by every instance created from it, so a child re-spawned
/// after its parent's retry continues where the previous instance stopped.
pub type SharedScript = Arc<Mutex<ScriptState>>;

pub fn script(outcomes: Vec<Outcome>) -> SharedScript {
  Arc::new(Mutex::new(ScriptState { outcomes, cursor: 0 }))
}

/// Plays back outcomes in order; once exhausted, repeats the last one.
pub struct ScriptedWork {
  label: String,
  log: HookLog,
  script: SharedScript,
}

impl ScriptedWork {
  pub fn new(label: &str, log: &HookLog, outcomes: Vec<Outcome>) -> Self {
    Self::with_script(label, log, script(outcomes))
  }

  pub fn with_script(label: &str, log: &HookLog, script: SharedScript) -> Self {
    Self {
      label: label.to_string(),
      log: log.clone(),
      script,
    }
  }

  fn next_outcome(&self) -> Outcome {
    let mut state = self.script.lock();
    let outcome = state
      .outcomes
      .get(state.cursor)
      .or(state.outcomes.last())
      .copied()
      .unwrap_or(Outcome::Success);
    state.cursor += 1;
    outcome
  }
}

impl Work for ScriptedWork {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    self.log.push(format!("{}:do_work", self.label));
    match self.next_outcome() {
      Outcome::Running => Ok(WorkState::Running),
      Outcome::Waiting => Ok(WorkState::Waiting),
      Outcome::WaitThenWake => {
        cx.waker().wake_by_ref();
        Ok(WorkState::Waiting)
      }
      Outcome::Success => Ok(WorkState::Success),
      Outcome::Failure => Ok(WorkState::Failure),
      Outcome::Error(message) => Err(anyhow::anyhow!(message)),
    }
  }

  fn on_reset(&mut self) {
    self.log.push(format!("{}:reset", self.label));
  }

  fn on_failure_retry(&mut self, _cx: &WorkContext<'_>) {
    self.log.push(format!("{}:retry", self.label));
  }

  fn on_failure_raise(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:failure@{}", self.label, cx.state()));
  }

  fn on_success(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:success@{}", self.label, cx.state()));
  }

  fn on_abort(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:abort@{}", self.label, cx.state()));
  }
}

// --- Fan-out composite over scripted children ---
pub struct ChildPlan {
  pub name: String,
  pub retry_policy: RetryPolicy,
  pub script: SharedScript,
}

pub fn child(name: &str, outcomes: Vec<Outcome>) -> ChildPlan {
  ChildPlan {
    name: name.to_string(),
    retry_policy: RetryPolicy::Never,
    script: script(outcomes),
  }
}

/// Composite using `FanOut`; logs its aggregated state on every poll and
/// counts polls where "all done" and "any running" held at once.
pub struct FanOutProbe {
  label: String,
  log: HookLog,
  children: Vec<ChildPlan>,
  fan_out: FanOut<ScriptedWork>,
  pub inconsistent_polls: Arc<AtomicUsize>,
}

impl FanOutProbe {
  pub fn new(label: &str, log: &HookLog, children: Vec<ChildPlan>) -> Self {
    Self {
      label: label.to_string(),
      log: log.clone(),
      children,
      fan_out: FanOut::new(),
      inconsistent_polls: Arc::new(AtomicUsize::new(0)),
    }
  }
}

impl Work for FanOutProbe {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    let log = &self.log;
    let children = &self.children;
    let state = self.fan_out.poll(cx, |cx| {
      children
        .iter()
        .map(|plan| {
          cx.spawn_child(
            plan.name.clone(),
            plan.retry_policy,
            ScriptedWork::with_script(&plan.name, log, Arc::clone(&plan.script)),
          )
        })
        .collect()
    })?;
    if cx.all_children_done() && cx.any_child_running() {
      self.inconsistent_polls.fetch_add(1, Ordering::SeqCst);
    }
    self.log.push(format!("{}:{}", self.label, state));
    Ok(state)
  }

  fn on_reset(&mut self) {
    self.fan_out.reset();
    self.log.push(format!("{}:reset", self.label));
  }

  fn on_failure_retry(&mut self, _cx: &WorkContext<'_>) {
    self.log.push(format!("{}:retry", self.label));
  }

  fn on_failure_raise(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:failure@{}", self.label, cx.state()));
  }

  fn on_success(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:success@{}", self.label, cx.state()));
  }

  fn on_abort(&mut self, cx: &WorkContext<'_>) {
    self.log.push(format!("{}:abort@{}", self.label, cx.state()));
  }
}

/// Cranks until the root is terminal; panics after `max_cranks`.
pub fn crank_to_completion(tree: &mut WorkTree, max_cranks: usize) -> WorkState {
  for _ in 0..max_cranks {
    let state = tree.crank().expect("crank failed");
    if state.is_terminal() {
      return state;
    }
  }
  panic!("tree did not reach a terminal state within {} cranks", max_cranks);
}

// --- Futures and fetchers ---

/// Pending on the first poll (waking itself), ready on the second.
pub struct YieldOnce {
  yielded: bool,
}

impl YieldOnce {
  pub fn new() -> Self {
    Self { yielded: false }
  }
}

impl Future for YieldOnce {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    if self.yielded {
      Poll::Ready(())
    } else {
      self.yielded = true;
      cx.waker().wake_by_ref();
      Poll::Pending
    }
  }
}

pub fn archives(names: &[&str]) -> Vec<ArchiveDescriptor> {
  names.iter().map(|name| ArchiveDescriptor::new(*name)).collect()
}

/// Answers from a fixed table.
#[derive(Default)]
pub struct StaticFetcher {
  answers: HashMap<String, Result<HistoryArchiveState, String>>,
  yield_first: bool,
  delay: Option<Duration>,
  pub calls: AtomicUsize,
}

impl StaticFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn answer(mut self, archive: &str, server: &str, current_ledger: u32) -> Self {
    self.answers.insert(
      archive.to_string(),
      Ok(HistoryArchiveState {
        server: server.to_string(),
        current_ledger,
      }),
    );
    self
  }

  pub fn fail(mut self, archive: &str, message: &str) -> Self {
    self.answers.insert(archive.to_string(), Err(message.to_string()));
    self
  }

  /// Every fetch is pending once before answering.
  pub fn yielding(mut self) -> Self {
    self.yield_first = true;
    self
  }

  /// Every fetch sleeps on the tokio timer before answering.
  pub fn delayed(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }
}

#[async_trait]
impl ArchiveStateFetcher for StaticFetcher {
  async fn fetch(&self, archive: &ArchiveDescriptor) -> anyhow::Result<HistoryArchiveState> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.yield_first {
      YieldOnce::new().await;
    }
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    match self.answers.get(archive.name()) {
      Some(Ok(state)) => Ok(state.clone()),
      Some(Err(message)) => Err(anyhow::anyhow!(message.clone())),
      None => Err(anyhow::anyhow!("unknown archive '{}'", archive.name())),
    }
  }
}
