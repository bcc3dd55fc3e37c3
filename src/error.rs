use std::time::Duration;

use thiserror::Error;

/// Errors returned by caller-supplied operations (single tasks, pool compute and
/// finalize phases, periodic bodies).
///
/// Whatever a failing operation returns is surfaced verbatim as the terminal error
/// of its [`TaskHandle`](crate::TaskHandle). The enum is `Clone + PartialEq` so the
/// same value can be handed to any number of waiters and compared by value.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
  /// Execution failed but may succeed if retried.
  #[error("execution failed: {error}")]
  Fail { error: String },

  /// Non-recoverable failure; retry hooks should not reschedule it.
  #[error("fatal error (no retry): {error}")]
  Fatal { error: String },
}

impl TaskError {
  pub fn fail(error: impl Into<String>) -> Self {
    TaskError::Fail { error: error.into() }
  }

  pub fn fatal(error: impl Into<String>) -> Self {
    TaskError::Fatal { error: error.into() }
  }

  /// Whether a retry hook may reasonably reschedule the operation.
  pub fn is_retryable(&self) -> bool {
    matches!(self, TaskError::Fail { .. })
  }

  /// Short stable label (snake_case) for logs and metrics.
  pub fn as_label(&self) -> &'static str {
    match self {
      TaskError::Fail { .. } => "task_failed",
      TaskError::Fatal { .. } => "task_fatal",
    }
  }
}

/// Outcome of one periodic cycle, as seen by the retry hooks.
///
/// [`RetryError::Retry`] is the sentinel raised whenever a cycle finished without an
/// application error; it means "nothing went wrong, keep going". Any application
/// error is carried through [`RetryError::Task`] so a classification hook can
/// inspect it before deciding whether to continue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
  /// Sentinel: the last cycle completed cleanly.
  #[error("retry")]
  Retry,

  /// The last cycle failed with an operation error.
  #[error(transparent)]
  Task(#[from] TaskError),
}

impl RetryError {
  /// Whether this outcome is the continue-sentinel.
  pub fn is_retry(&self) -> bool {
    matches!(self, RetryError::Retry)
  }

  /// True for the sentinel and for retryable operation errors.
  pub fn is_retryable(&self) -> bool {
    match self {
      RetryError::Retry => true,
      RetryError::Task(err) => err.is_retryable(),
    }
  }
}

/// Errors raised by the shutdown coordinator itself, as opposed to failures of the
/// tasks it waits on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
  /// The shared grace period elapsed before every done signal fired.
  #[error("shutdown deadline {grace:?} exceeded; {pending} signal(s) still pending")]
  DeadlineExceeded {
    /// The configured grace duration.
    grace: Duration,
    /// How many done signals had not been observed when the deadline hit.
    pending: usize,
  },
}
