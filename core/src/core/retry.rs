// keel/src/core/retry.rs

//! Retry policies and the backoff schedule applied between attempts.

use std::time::Duration;

/// Bounded exponential backoff: `min(base * 2^(attempt - 1), max)`.
///
/// The delay is a pure function of the attempt number and never decreases
/// as the attempt number grows. Both bounds are capped at
/// [`Backoff::MAX_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  base: Duration,
  max: Duration,
}

impl Backoff {
  pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
  pub const DEFAULT_MAX: Duration = Duration::from_secs(256);
  /// Longest delay any backoff will schedule (one week).
  pub const MAX_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

  /// Doubling delay starting at `base`, clamped to `max`.
  /// A `max` below `base` is raised to `base`.
  pub fn exponential(base: Duration, max: Duration) -> Self {
    let base = base.min(Self::MAX_DELAY);
    Self {
      base,
      max: max.max(base).min(Self::MAX_DELAY),
    }
  }

  /// The same delay before every retry.
  pub fn fixed(delay: Duration) -> Self {
    let delay = delay.min(Self::MAX_DELAY);
    Self { base: delay, max: delay }
  }

  pub fn base(&self) -> Duration {
    self.base
  }

  pub fn max(&self) -> Duration {
    self.max
  }

  /// Delay before retry number `attempt` (1-based; 0 is treated as 1).
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    self.base.saturating_mul(factor).min(self.max)
  }
}

impl Default for Backoff {
  fn default() -> Self {
    Self::exponential(Self::DEFAULT_BASE, Self::DEFAULT_MAX)
  }
}

/// How a node reacts to a failed attempt. Fixed at node creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
  /// Any failure is immediately fatal for the node.
  Never,
  /// Up to `max_retries` retries, each preceded by the backoff delay.
  Bounded { max_retries: u32, backoff: Backoff },
  /// Retries indefinitely under backoff. For best-effort background work.
  Unbounded { backoff: Backoff },
}

impl RetryPolicy {
  pub const RETRY_ONCE: u32 = 1;
  pub const RETRY_A_FEW: u32 = 5;
  pub const RETRY_A_LOT: u32 = 32;

  pub fn bounded(max_retries: u32, backoff: Backoff) -> Self {
    RetryPolicy::Bounded { max_retries, backoff }
  }

  pub fn unbounded(backoff: Backoff) -> Self {
    RetryPolicy::Unbounded { backoff }
  }

  pub fn once() -> Self {
    Self::bounded(Self::RETRY_ONCE, Backoff::default())
  }

  pub fn a_few() -> Self {
    Self::bounded(Self::RETRY_A_FEW, Backoff::default())
  }

  pub fn a_lot() -> Self {
    Self::bounded(Self::RETRY_A_LOT, Backoff::default())
  }

  pub fn forever() -> Self {
    Self::unbounded(Backoff::default())
  }

  /// `None` for unbounded policies.
  pub fn max_retries(&self) -> Option<u32> {
    match self {
      RetryPolicy::Never => Some(0),
      RetryPolicy::Bounded { max_retries, .. } => Some(*max_retries),
      RetryPolicy::Unbounded { .. } => None,
    }
  }

  pub fn backoff(&self) -> Option<&Backoff> {
    match self {
      RetryPolicy::Never => None,
      RetryPolicy::Bounded { backoff, .. } | RetryPolicy::Unbounded { backoff } => Some(backoff),
    }
  }

  /// Whether a node that has already retried `retries_so_far` times may
  /// make another attempt.
  pub fn allows_retry(&self, retries_so_far: u32) -> bool {
    match self.max_retries() {
      Some(max) => retries_so_far < max,
      None => true,
    }
  }

  /// Backoff before retry number `attempt`. `Never` schedules no backoff.
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    self
      .backoff()
      .map_or(Duration::ZERO, |backoff| backoff.delay_for_attempt(attempt))
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    RetryPolicy::Never
  }
}
