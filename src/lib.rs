//! Cancellable background tasks for tokio: launch a single operation under a
//! derived cancellation scope, fan a collection out to a bounded worker pool with
//! group-cancel-on-first-error, repeat an operation on a fixed cadence under a
//! retry policy, and coordinate deadline-bounded graceful shutdown.
//!
//! Cancellation is cooperative throughout: every operation receives a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and is expected to
//! observe it and return promptly.

mod error;
mod handle;
mod periodic;
mod pool;
mod retry;
mod runner;
mod shutdown;

pub use error::{RetryError, RuntimeError, TaskError};
pub use handle::TaskHandle;
pub use periodic::{run_periodically, PeriodicOptions};
pub use pool::{run_concurrent, ComputeFn, FinalizeFn};
pub use retry::{until_fail, BackoffPolicy, NotifyOnError, OnError, RetryOptions};
pub use runner::run;
pub use shutdown::{check_shutdown_deadline, graceful_shutdown, wait_for_shutdown_signal};
