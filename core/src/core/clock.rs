// keel/src/core/clock.rs

//! Time source used to schedule and expire backoff deadlines.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + Debug {
  fn now(&self) -> Instant;
}

/// Monotonic process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
  pub fn new() -> Self {
    ManualClock(Arc::new(Mutex::new(Instant::now())))
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.0.lock();
    *now += by;
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    *self.0.lock()
  }
}
