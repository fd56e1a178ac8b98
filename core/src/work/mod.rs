// keel/src/work/mod.rs

//! The `Work` abstraction and the composition helpers built on it.

pub mod adapters;
pub mod context;
pub mod definition;
pub mod fan_out;
pub mod sequence;

pub use adapters::{from_fn, BoxWorkFuture, FnWork, PendingFuture};
pub use context::WorkContext;
pub use definition::{AsAny, ChildHandle, NodeId, Work};
pub use fan_out::FanOut;
pub use sequence::WorkSequence;
