// keel/src/config.rs

use crate::error::{KeelError, KeelResult};
use std::env;
use std::time::Duration;
use tracing::{event, Level};

/// Tuning for the `Scheduler` loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
  /// How long a waiting root with no backoff deadline sleeps before the
  /// scheduler re-checks it, absent any wake-up.
  pub idle_wait: Duration,
  /// Upper bound on cranks per run. `None` means unlimited.
  pub max_cranks: Option<u64>,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      idle_wait: Duration::from_secs(1),
      max_cranks: None,
    }
  }
}

impl SchedulerConfig {
  pub const IDLE_WAIT_ENV: &'static str = "KEEL_IDLE_WAIT_MS";
  pub const MAX_CRANKS_ENV: &'static str = "KEEL_MAX_CRANKS";

  /// Defaults overridden by `KEEL_IDLE_WAIT_MS` and `KEEL_MAX_CRANKS`.
  pub fn from_env() -> KeelResult<Self> {
    let mut config = Self::default();

    if let Some(raw) = read_env(Self::IDLE_WAIT_ENV) {
      let millis = parse_positive(Self::IDLE_WAIT_ENV, &raw)?;
      config.idle_wait = Duration::from_millis(millis);
    }
    if let Some(raw) = read_env(Self::MAX_CRANKS_ENV) {
      config.max_cranks = Some(parse_positive(Self::MAX_CRANKS_ENV, &raw)?);
    }

    event!(Level::DEBUG, ?config, "Scheduler configuration loaded.");
    Ok(config)
  }

  pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
    self.idle_wait = idle_wait;
    self
  }

  pub fn with_max_cranks(mut self, max_cranks: u64) -> Self {
    self.max_cranks = Some(max_cranks);
    self
  }
}

fn read_env(key: &str) -> Option<String> {
  env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_positive(key: &str, raw: &str) -> KeelResult<u64> {
  let value = raw.trim().parse::<u64>().map_err(|e| KeelError::Configuration {
    key: key.to_string(),
    message: format!("invalid value '{}': {}", raw, e),
  })?;
  if value == 0 {
    return Err(KeelError::Configuration {
      key: key.to_string(),
      message: "must be greater than zero".to_string(),
    });
  }
  Ok(value)
}
