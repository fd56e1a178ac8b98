// keel/src/work/adapters.rs

//! Small building blocks for leaf works: closure-backed work, and driving a
//! future from `do_work` without blocking the scheduler.

use crate::core::state::WorkState;
use crate::work::context::WorkContext;
use crate::work::definition::Work;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Leaf work whose progress function is a closure.
pub struct FnWork<F> {
  step: F,
}

pub fn from_fn<F>(step: F) -> FnWork<F>
where
  F: FnMut(&mut WorkContext<'_>) -> anyhow::Result<WorkState> + Send + 'static,
{
  FnWork { step }
}

impl<F> Work for FnWork<F>
where
  F: FnMut(&mut WorkContext<'_>) -> anyhow::Result<WorkState> + Send + 'static,
{
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    (self.step)(cx)
  }
}

pub type BoxWorkFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// A future owned by a work and polled from its `do_work`.
///
/// The future is created on the first poll and polled with the node's waker,
/// so whatever completes it re-schedules the node. Return `Waiting` while
/// this yields `Poll::Pending`.
pub struct PendingFuture<T> {
  future: Option<BoxWorkFuture<T>>,
}

impl<T> PendingFuture<T> {
  pub fn new() -> Self {
    Self { future: None }
  }

  pub fn is_in_flight(&self) -> bool {
    self.future.is_some()
  }

  /// Drops an in-flight future.
  pub fn reset(&mut self) {
    self.future = None;
  }

  pub fn poll_with<F>(&mut self, cx: &WorkContext<'_>, start: F) -> Poll<anyhow::Result<T>>
  where
    F: FnOnce() -> BoxWorkFuture<T>,
  {
    let future = self.future.get_or_insert_with(start);
    let waker = cx.waker();
    let mut task_cx = Context::from_waker(&waker);
    match future.as_mut().poll(&mut task_cx) {
      Poll::Ready(output) => {
        self.future = None;
        Poll::Ready(output)
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Default for PendingFuture<T> {
  fn default() -> Self {
    Self::new()
  }
}
