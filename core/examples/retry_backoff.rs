// keel/examples/retry_backoff.rs

use keel::{from_fn, Backoff, FanOut, KeelError, RetryPolicy, Scheduler, Work, WorkContext, WorkState};
use std::time::Duration;
use tracing::{info, Level};

// A flaky leaf: fails `failures` times, then succeeds.
fn flaky(failures: u32) -> impl Work {
  let mut attempts = 0;
  from_fn(move |cx: &mut WorkContext<'_>| {
    attempts += 1;
    if attempts <= failures {
      anyhow::bail!("{} attempt {} hit a transient error", cx.name(), attempts);
    }
    info!(work = %cx.name(), retries = cx.retries(), "Leaf succeeded.");
    Ok(WorkState::Success)
  })
}

// A composite running three flaky leaves with different retry budgets.
struct Batch {
  fan_out: FanOut<dyn Work>,
}

impl Work for Batch {
  fn do_work(&mut self, cx: &mut WorkContext<'_>) -> anyhow::Result<WorkState> {
    let backoff = Backoff::exponential(Duration::from_millis(50), Duration::from_millis(400));
    let state = self.fan_out.poll(cx, |cx| {
      Ok(vec![
        cx.spawn_boxed("steady", RetryPolicy::Never, Box::new(flaky(0)))?,
        cx.spawn_boxed("wobbly", RetryPolicy::bounded(3, backoff), Box::new(flaky(2)))?,
        cx.spawn_boxed("stubborn", RetryPolicy::unbounded(backoff), Box::new(flaky(5)))?,
      ])
    })?;
    Ok(state)
  }

  fn on_success(&mut self, cx: &WorkContext<'_>) {
    info!(work = %cx.name(), "Every leaf eventually succeeded.");
  }

  fn on_failure_raise(&mut self, cx: &WorkContext<'_>) {
    info!(work = %cx.name(), "Batch gave up.");
  }
}

#[tokio::main]
async fn main() -> Result<(), KeelError> {
  tracing_subscriber::fmt().with_max_level(Level::INFO).init();

  info!("--- Retry Backoff Example ---");

  let mut scheduler = Scheduler::new(
    "batch",
    RetryPolicy::Never,
    Batch {
      fan_out: FanOut::new(),
    },
  );
  let state = scheduler.run().await?;
  info!(%state, "Batch finished.");
  Ok(())
}
