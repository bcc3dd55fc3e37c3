use crate::error::TaskError;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A handle to a task launched by [`run`](crate::run), [`run_concurrent`](crate::run_concurrent)
/// or [`run_periodically`](crate::run_periodically).
///
/// Allows awaiting completion and reading the terminal error. The handle is shared:
/// the launching call keeps the only write path, while any number of observers may
/// [`wait`](TaskHandle::wait) or select on [`done`](TaskHandle::done).
#[derive(Debug)]
pub struct TaskHandle {
  state: Mutex<State>,
  done: CancellationToken,
}

#[derive(Debug, Default)]
struct State {
  finished: bool,
  err: Option<TaskError>,
}

impl TaskHandle {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(State::default()),
      done: CancellationToken::new(),
    }
  }

  /// Waits until the task has completed, then returns its terminal result.
  ///
  /// May be called any number of times, by any number of callers; every call
  /// returns the same value once it is set.
  pub async fn wait(&self) -> Result<(), TaskError> {
    self.done.cancelled().await;

    let state = self.state.lock();
    match &state.err {
      Some(err) => Err(err.clone()),
      None => Ok(()),
    }
  }

  /// Returns a readiness token without blocking, for use in `tokio::select!`
  /// alongside other events.
  ///
  /// The token fires when the task completes. It is a child of the internal done
  /// signal, so cancelling the returned token does not complete the handle.
  pub fn done(&self) -> CancellationToken {
    self.done.child_token()
  }

  /// Non-blocking completion probe.
  pub fn is_done(&self) -> bool {
    self.state.lock().finished
  }

  /// Marks the task as complete with no error and fires the done signal.
  ///
  /// Idempotent: the first caller flips the flag and fires the signal; later calls
  /// (including the owning task's own completion) observe the flag and return.
  /// Firing the signal unblocks every current and future waiter.
  pub fn finish(&self) {
    self.complete(Ok(()));
  }

  /// One-shot transition: records the result and fires the done signal, unless the
  /// handle already completed. The check-and-set and the error write happen under
  /// the lock; the signal fires after the lock is released.
  pub(crate) fn complete(&self, result: Result<(), TaskError>) {
    {
      let mut state = self.state.lock();
      if state.finished {
        return;
      }
      state.finished = true;
      state.err = result.err();
    }

    self.done.cancel();
  }
}
