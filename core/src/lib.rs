// src/lib.rs

//! Keel: a hierarchical, polling-based scheduler for composable units of
//! asynchronous work.
//!
//! Keel lets you describe multi-step operations as trees of work nodes,
//! with features like:
//!  - A small state machine per node (`Running`, `Waiting`, `Success`, `Failure`, `Aborted`).
//!  - Parent/child composition with fan-out/fan-in aggregation.
//!  - Per-node retry policies with bounded exponential backoff.
//!  - Exactly-once reporting hooks on terminal states.
//!  - Depth-first cooperative abort.
//!  - Non-blocking integration with futures through per-node wakers.

pub mod archive;
pub mod config;
pub mod core;
pub mod error;
pub mod math;
pub mod scheduler;
pub mod work;

// --- Re-exports for the Public API ---

pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::retry::{Backoff, RetryPolicy};
pub use crate::core::state::WorkState;

pub use crate::work::{
  from_fn, AsAny, BoxWorkFuture, ChildHandle, FanOut, FnWork, NodeId, PendingFuture, Work, WorkContext, WorkSequence,
};

pub use crate::scheduler::{AbortHandle, Scheduler, WorkTree};

pub use crate::config::SchedulerConfig;
pub use crate::error::{KeelError, KeelResult};

pub use crate::math::{closest_cluster, k_means};

/*
    Core Workflow:
    1. Implement `Work` for each unit of work. `do_work` does one bounded
       increment and returns the node's new `WorkState`; it never blocks.
    2. Composite works spawn children through `WorkContext::spawn_child`,
       typically via `FanOut`, and fold the children's terminal states into
       their own.
    3. Give every node a `RetryPolicy`. Failed attempts are retried after
       the policy's backoff until the retries run out.
    4. Build a `Scheduler` around the root work and `run().await` it, or
       call `crank_once()` from your own loop.
    5. Override `on_success` / `on_failure_raise` to report results; exactly
       one of them fires per node.
*/
