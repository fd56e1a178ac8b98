// keel/src/scheduler/mod.rs

//! The work tree arena and the loop that drives it.

pub mod execution;
pub mod tree;
pub mod wake;

pub use execution::Scheduler;
pub use tree::WorkTree;
pub use wake::AbortHandle;
