use crate::error::{RetryError, TaskError};
use crate::handle::TaskHandle;
use crate::retry::{self, BackoffPolicy, NotifyOnError, OnError, RetryOptions};
use crate::runner::run;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Hooks for [`run_periodically`], forwarded to the retry loop.
#[derive(Clone, Default)]
pub struct PeriodicOptions {
  /// Classification hook; defaults to retrying only while cycles are clean.
  pub on_error: Option<OnError>,
  /// Invoked with the latest outcome before each retry.
  pub notify_on_error: Option<NotifyOnError>,
}

impl PeriodicOptions {
  pub fn with_on_error(mut self, on_error: impl Fn(&RetryError) -> bool + Send + Sync + 'static) -> Self {
    self.on_error = Some(Arc::new(on_error));
    self
  }

  pub fn with_notify_on_error(mut self, notify: impl Fn(&RetryError) + Send + Sync + 'static) -> Self {
    self.notify_on_error = Some(Arc::new(notify));
    self
  }
}

/// Invokes `op` through the single-task runner on a fixed cadence until the retry
/// policy stops it, `stop` fires, or `ctx` is cancelled.
///
/// Invocations are strictly sequential: each cycle awaits the previous handle
/// before the interval sleep begins, so runs never overlap. A clean cycle raises
/// the continue-sentinel; a failed cycle wraps the operation error for the
/// `on_error` hook. With the default classification any operation error is
/// terminal and becomes the handle's terminal error, unwrapped; stopping via
/// signal or cancellation completes the handle with `Ok(())`.
pub fn run_periodically<F, Fut>(
  ctx: &CancellationToken,
  op: F,
  interval: Duration,
  stop: &CancellationToken,
  options: PeriodicOptions,
) -> Arc<TaskHandle>
where
  F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
  let handle = Arc::new(TaskHandle::new());
  let ctx = ctx.clone();
  let stop = stop.clone();
  let op = Arc::new(op);

  let runner_handle = handle.clone();
  tokio::spawn(async move {
    let backoff = BackoffPolicy::constant(interval);
    let retry_options = RetryOptions {
      on_error: options.on_error,
      notify_on_error: options.notify_on_error,
    };

    let cycle_ctx = ctx.clone();
    let cycle_stop = stop.clone();
    let result = retry::until_fail(
      &ctx,
      move || {
        let op = op.clone();
        let ctx = cycle_ctx.clone();
        let stop = cycle_stop.clone();
        async move {
          let task = run(&ctx, move |scope| op(scope), &stop);
          match task.wait().await {
            Ok(()) => RetryError::Retry,
            Err(err) => RetryError::Task(err),
          }
        }
      },
      &backoff,
      &stop,
      retry_options,
    )
    .await;

    runner_handle.complete(result);
  });

  handle
}
