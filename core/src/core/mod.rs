pub mod clock;
pub mod retry;
pub mod state;

// Re-export key types for easier access from other keel modules (and lib.rs)
pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::{Backoff, RetryPolicy};
pub use state::WorkState;
