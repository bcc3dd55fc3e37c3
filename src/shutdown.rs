use crate::error::RuntimeError;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fires the shutdown signal, then waits for every done signal against one shared
/// grace deadline.
///
/// The deadline starts once, when the call begins; it is not reset per signal.
/// `shutdown` is the conventional stop signal consumed by the runner, pool and
/// periodic APIs; the done signals are typically [`TaskHandle::done`](crate::TaskHandle::done)
/// tokens. Re-firing an already-fired shutdown token is a no-op.
pub async fn graceful_shutdown(
  grace: Duration,
  shutdown: &CancellationToken,
  done: &[CancellationToken],
) -> Result<(), RuntimeError> {
  debug!(?grace, signals = done.len(), "raising shutdown signal");
  shutdown.cancel();

  check_shutdown_deadline(grace, done).await
}

/// Waits for every done signal to fire, sequentially, against one shared deadline
/// started at the beginning of the call.
///
/// Returns [`RuntimeError::DeadlineExceeded`] as soon as the deadline elapses with
/// a signal still pending; the remaining signals are not waited on. For callers
/// that manage their own stop signal separately from the wait.
pub async fn check_shutdown_deadline(
  grace: Duration,
  done: &[CancellationToken],
) -> Result<(), RuntimeError> {
  let deadline = tokio::time::sleep(grace);
  tokio::pin!(deadline);

  for (i, signal) in done.iter().enumerate() {
    tokio::select! {
      _ = signal.cancelled() => {}
      _ = &mut deadline => {
        let pending = done.len() - i;
        warn!(?grace, pending, "shutdown deadline exceeded");
        return Err(RuntimeError::DeadlineExceeded { grace, pending });
      }
    }
  }

  Ok(())
}

/// Waits for a process termination signal.
///
/// Completes when `SIGINT`, `SIGTERM` or `SIGQUIT` is received (Ctrl-C on
/// non-unix platforms). Each call registers independent listeners. The typical
/// caller fires its shutdown token off this and then runs [`graceful_shutdown`].
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
  use tokio::signal::unix::{signal, SignalKind};

  let mut sigint = signal(SignalKind::interrupt())?;
  let mut sigterm = signal(SignalKind::terminate())?;
  let mut sigquit = signal(SignalKind::quit())?;

  tokio::select! {
    _ = tokio::signal::ctrl_c() => {},
    _ = sigint.recv() => {},
    _ = sigterm.recv() => {},
    _ = sigquit.recv() => {},
  }
  Ok(())
}

/// Waits for a process termination signal.
///
/// Completes when Ctrl-C is received. Each call registers an independent listener.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
  tokio::signal::ctrl_c().await
}
