use crate::error::{RetryError, TaskError};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Classification hook: given the latest cycle outcome, decide whether to retry.
/// Returning `false` makes the outcome terminal.
pub type OnError = Arc<dyn Fn(&RetryError) -> bool + Send + Sync>;

/// Notification hook: invoked with the latest outcome before each retry sleep.
/// Observability side-channel only; it cannot influence the loop.
pub type NotifyOnError = Arc<dyn Fn(&RetryError) + Send + Sync>;

/// Hooks for [`until_fail`].
#[derive(Clone, Default)]
pub struct RetryOptions {
  pub on_error: Option<OnError>,
  pub notify_on_error: Option<NotifyOnError>,
}

impl RetryOptions {
  pub fn with_on_error(mut self, on_error: impl Fn(&RetryError) -> bool + Send + Sync + 'static) -> Self {
    self.on_error = Some(Arc::new(on_error));
    self
  }

  pub fn with_notify_on_error(mut self, notify: impl Fn(&RetryError) + Send + Sync + 'static) -> Self {
    self.notify_on_error = Some(Arc::new(notify));
    self
  }
}

/// Retry delay policy: `first × factor^attempt`, clamped to `max`.
///
/// `factor == 1.0` keeps the delay constant at `first`; larger factors grow it
/// exponentially up to the cap. The base delay is derived purely from the attempt
/// number, so delays never feed back into later calculations.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
  /// Delay before the first retry.
  pub first: Duration,
  /// Cap applied to every computed delay.
  pub max: Duration,
  /// Multiplicative growth factor (`>= 1.0` recommended).
  pub factor: f64,
}

impl Default for BackoffPolicy {
  fn default() -> Self {
    Self {
      first: Duration::from_millis(100),
      max: Duration::from_secs(30),
      factor: 1.0,
    }
  }
}

impl BackoffPolicy {
  /// A fixed-cadence policy: every attempt waits exactly `interval`.
  pub fn constant(interval: Duration) -> Self {
    Self {
      first: interval,
      max: interval,
      factor: 1.0,
    }
  }

  /// Computes the delay for the given attempt number (0-indexed).
  pub fn next(&self, attempt: u32) -> Duration {
    let max_secs = self.max.as_secs_f64();
    let exp = attempt.min(i32::MAX as u32) as i32;
    let raw = self.first.as_secs_f64() * self.factor.powi(exp);

    if !raw.is_finite() || raw < 0.0 || raw > max_secs {
      self.max
    } else {
      Duration::from_secs_f64(raw)
    }
  }
}

/// Runs `cycle` repeatedly until classification stops it, `stop` fires, or `ctx` is
/// cancelled, sleeping the policy's delay between attempts.
///
/// Each cycle yields a [`RetryError`]: the sentinel for a clean cycle, or a wrapped
/// operation error. The `on_error` hook (default: retry only on the sentinel)
/// decides whether to continue; when it declines, the sentinel maps to `Ok(())` and
/// a wrapped error is returned unwrapped. The `notify_on_error` hook observes the
/// latest outcome before every retry sleep. A stop or cancellation during the sleep
/// ends the loop with `Ok(())`.
pub async fn until_fail<C, Fut>(
  ctx: &CancellationToken,
  mut cycle: C,
  backoff: &BackoffPolicy,
  stop: &CancellationToken,
  options: RetryOptions,
) -> Result<(), TaskError>
where
  C: FnMut() -> Fut,
  Fut: Future<Output = RetryError>,
{
  let on_error: OnError = options
    .on_error
    .unwrap_or_else(|| Arc::new(|err: &RetryError| err.is_retry()));

  let mut attempt: u32 = 0;

  loop {
    if stop.is_cancelled() || ctx.is_cancelled() {
      return Ok(());
    }

    let outcome = cycle().await;

    if !on_error(&outcome) {
      return match outcome {
        RetryError::Retry => Ok(()),
        RetryError::Task(err) => Err(err),
      };
    }

    if let Some(notify) = &options.notify_on_error {
      notify(&outcome);
    }

    let delay = backoff.next(attempt);
    attempt = attempt.saturating_add(1);
    trace!(attempt, ?delay, outcome = %outcome, "retry scheduled");

    tokio::select! {
      _ = stop.cancelled() => return Ok(()),
      _ = ctx.cancelled() => return Ok(()),
      _ = tokio::time::sleep(delay) => {}
    }
  }
}
