use crate::error::TaskError;
use crate::handle::TaskHandle;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Runs the operation on a freshly spawned task and returns a handle to it.
///
/// A child token is derived from `ctx` and handed to the operation. It is cancelled
/// either when the operation returns (so background watchers tied to the same scope
/// stop promptly) or when `stop` fires; cancellation is cooperative, so an operation
/// that never observes its token never completes its handle.
///
/// The operation's result becomes the handle's terminal value, verbatim. An
/// operation that observes cancellation and returns `Ok(())` is indistinguishable
/// from one that completed naturally.
pub fn run<F, Fut>(ctx: &CancellationToken, op: F, stop: &CancellationToken) -> Arc<TaskHandle>
where
  F: FnOnce(CancellationToken) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
  let child = ctx.child_token();
  let handle = Arc::new(TaskHandle::new());

  // Stop watcher: relays the stop signal into the child scope. It never completes
  // the handle itself, and exits once the child is cancelled from either side.
  let stop = stop.clone();
  let relay = child.clone();
  tokio::spawn(async move {
    tokio::select! {
      _ = stop.cancelled() => {
        trace!("stop signal fired, cancelling task scope");
        relay.cancel();
      }
      _ = relay.cancelled() => {}
    }
  });

  let task_handle = handle.clone();
  let scope = child.clone();
  tokio::spawn(async move {
    let result = op(scope).await;

    child.cancel();

    if let Err(err) = &result {
      debug!(error = %err, label = err.as_label(), "task completed with error");
    }
    task_handle.complete(result);
  });

  handle
}
