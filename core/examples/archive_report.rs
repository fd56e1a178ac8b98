// keel/examples/archive_report.rs

use async_trait::async_trait;
use keel::archive::{ArchiveDescriptor, ArchiveReportWork, ArchiveStateFetcher, HistoryArchiveState};
use keel::{KeelError, RetryPolicy, Scheduler, SchedulerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

// 1. A fetcher standing in for the HTTP client. Each archive answers after
//    some latency, or not at all.
struct SimulatedFetcher {
  archives: HashMap<&'static str, (Duration, Option<u32>)>,
}

#[async_trait]
impl ArchiveStateFetcher for SimulatedFetcher {
  async fn fetch(&self, archive: &ArchiveDescriptor) -> anyhow::Result<HistoryArchiveState> {
    let (latency, ledger) = self
      .archives
      .get(archive.name())
      .copied()
      .ok_or_else(|| anyhow::anyhow!("no route to archive"))?;
    tokio::time::sleep(latency).await;
    match ledger {
      Some(current_ledger) => Ok(HistoryArchiveState {
        server: format!("stellar-core {}", archive.name()),
        current_ledger,
      }),
      None => anyhow::bail!("connection reset after {:?}", latency),
    }
  }
}

#[tokio::main]
async fn main() -> Result<(), KeelError> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .init();

  info!("--- Archive Report Example ---");

  // 2. Scheduler tuning comes from KEEL_IDLE_WAIT_MS / KEEL_MAX_CRANKS.
  let config = SchedulerConfig::from_env()?;

  let fetcher = Arc::new(SimulatedFetcher {
    archives: HashMap::from([
      ("sdf1", (Duration::from_millis(120), Some(52_436_011))),
      ("sdf2", (Duration::from_millis(40), Some(52_436_011))),
      ("sdf3", (Duration::from_millis(300), None)),
    ]),
  });
  let archives = ["sdf1", "sdf2", "sdf3"].into_iter().map(ArchiveDescriptor::new).collect();

  // 3. The report fans out one fetch per archive and logs a line for each
  //    archive that answered, through the tracing sink.
  let mut scheduler = Scheduler::with_config(
    config,
    ArchiveReportWork::NAME,
    RetryPolicy::Never,
    ArchiveReportWork::with_tracing_sink(archives, fetcher),
  );

  let state = scheduler.run().await?;
  info!(%state, cranks = scheduler.cranks(), "Archive report finished.");
  Ok(())
}
