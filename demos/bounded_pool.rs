use taskling::{run_concurrent, ComputeFn, FinalizeFn};

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Bounded Pool Demo ---");

  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();

  // Ten downloads, at most three in flight at once.
  let urls: Vec<String> = (1..=10).map(|i| format!("https://example.com/file-{i}")).collect();

  let op: ComputeFn<String, usize> = Arc::new(|_scope, url| {
    async move {
      info!("fetching {}", url);
      tokio::time::sleep(Duration::from_millis(200)).await;
      Ok(url.len())
    }
    .boxed()
  });

  let op_done: FinalizeFn<usize> = Arc::new(|_scope, bytes| {
    async move {
      info!("stored {} bytes", bytes);
      Ok(())
    }
    .boxed()
  });

  let pool = run_concurrent(&ctx, urls, 3, op, Some(op_done), &stop);

  match pool.wait().await {
    Ok(()) => info!("all downloads finished"),
    Err(err) => info!("pool stopped early: {}", err),
  }
}
