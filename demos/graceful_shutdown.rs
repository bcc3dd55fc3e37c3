use taskling::{graceful_shutdown, run, run_periodically, PeriodicOptions};

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Graceful Shutdown Demo ---");

  let ctx = CancellationToken::new();
  let shutdown = CancellationToken::new();

  // A long-lived worker that exits when the shutdown signal reaches its scope.
  let worker = run(
    &ctx,
    |scope| async move {
      loop {
        tokio::select! {
          _ = scope.cancelled() => {
            info!("worker draining");
            return Ok(());
          }
          _ = tokio::time::sleep(Duration::from_millis(150)) => {
            info!("worker heartbeat");
          }
        }
      }
    },
    &shutdown,
  );

  // A health probe on a one-second cadence.
  let probe = run_periodically(
    &ctx,
    |_scope| async move {
      info!("health probe ok");
      Ok(())
    },
    Duration::from_secs(1),
    &shutdown,
    PeriodicOptions::default(),
  );

  info!("running; press Ctrl-C to stop");
  if taskling::wait_for_shutdown_signal().await.is_err() {
    info!("signal listener unavailable, stopping immediately");
  }

  match graceful_shutdown(Duration::from_secs(5), &shutdown, &[worker.done(), probe.done()]).await {
    Ok(()) => info!("all tasks drained in time"),
    Err(err) => info!("forced exit: {}", err),
  }
}
