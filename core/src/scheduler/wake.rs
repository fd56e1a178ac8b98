// keel/src/scheduler/wake.rs

//! Cross-thread signalling into a single work tree: per-node wakers for
//! external completion events, and the tree-wide abort request.

use crate::work::definition::NodeId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Wake, Waker};
use tokio::sync::Notify;
use tracing::{event, Level};

/// Nodes whose external event fired since the last crank.
#[derive(Debug, Default)]
pub(crate) struct WakeQueue {
  pending: Mutex<Vec<NodeId>>,
  notify: Notify,
}

impl WakeQueue {
  pub(crate) fn push(&self, node: NodeId) {
    self.pending.lock().push(node);
    // Leaves a permit if the scheduler is not parked yet.
    self.notify.notify_one();
  }

  pub(crate) fn drain(&self) -> Vec<NodeId> {
    std::mem::take(&mut *self.pending.lock())
  }

  pub(crate) fn signal(&self) {
    self.notify.notify_one();
  }

  pub(crate) async fn notified(&self) {
    self.notify.notified().await
  }
}

struct NodeWaker {
  node: NodeId,
  queue: Arc<WakeQueue>,
}

impl Wake for NodeWaker {
  fn wake(self: Arc<Self>) {
    self.wake_by_ref();
  }

  fn wake_by_ref(self: &Arc<Self>) {
    event!(Level::TRACE, node = %self.node, "External wake-up queued.");
    self.queue.push(self.node);
  }
}

pub(crate) fn node_waker(node: NodeId, queue: Arc<WakeQueue>) -> Waker {
  Waker::from(Arc::new(NodeWaker { node, queue }))
}

/// Requests a cooperative abort of a whole tree from any thread.
///
/// The scheduler honors the request before its next crank; a node that is
/// mid-progress finishes its current increment first.
#[derive(Debug, Clone)]
pub struct AbortHandle {
  requested: Arc<AtomicBool>,
  queue: Arc<WakeQueue>,
}

impl AbortHandle {
  pub(crate) fn new(queue: Arc<WakeQueue>) -> Self {
    Self {
      requested: Arc::new(AtomicBool::new(false)),
      queue,
    }
  }

  pub fn abort(&self) {
    event!(Level::DEBUG, "Abort requested.");
    self.requested.store(true, Ordering::SeqCst);
    self.queue.signal();
  }

  pub fn is_requested(&self) -> bool {
    self.requested.load(Ordering::SeqCst)
  }
}
