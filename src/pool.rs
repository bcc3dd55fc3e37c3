use crate::error::TaskError;
use crate::handle::TaskHandle;

use std::sync::Arc;

use futures::future::BoxFuture;
use kanal::AsyncReceiver;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};

/// The compute phase of a pool element: receives the worker's cancellation scope
/// and one element, produces a result for the finalize phase.
pub type ComputeFn<T, R> =
  Arc<dyn Fn(CancellationToken, T) -> BoxFuture<'static, Result<R, TaskError>> + Send + Sync>;

/// The optional finalize phase: consumes a compute result under the same scope.
pub type FinalizeFn<R> =
  Arc<dyn Fn(CancellationToken, R) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// Fans `elements` out to at most `min(limit, elements.len())` concurrent workers
/// and returns immediately with a handle to the whole pool.
///
/// Every element is offered exactly once through a bounded queue that is pre-filled
/// and then closed; workers pull from it first-come-first-served until it is
/// drained, the scope is cancelled, or `stop` fires. A failing `op` or `op_done`
/// cancels the whole group; the handle's terminal error is the first error any
/// worker reported (in completion order), and later sibling errors are discarded.
///
/// Between the two phases each worker re-checks `stop` and its scope without
/// blocking, so work computed just before a stop arrived is not finalized for a
/// consumer that has already gone away. The check is best-effort: a finalize that
/// is already in flight may overlap a sibling's failure, and `op_done` is expected
/// to tolerate that.
///
/// An empty `elements` completes immediately with `Ok(())` and never invokes `op`.
pub fn run_concurrent<T, R>(
  ctx: &CancellationToken,
  elements: Vec<T>,
  limit: usize,
  op: ComputeFn<T, R>,
  op_done: Option<FinalizeFn<R>>,
  stop: &CancellationToken,
) -> Arc<TaskHandle>
where
  T: Send + 'static,
  R: Send + 'static,
{
  let handle = Arc::new(TaskHandle::new());

  if elements.is_empty() {
    handle.finish();
    return handle;
  }

  let limit = limit.min(elements.len());
  let child = ctx.child_token();
  let stop = stop.clone();
  let (tx, rx) = kanal::bounded_async::<T>(elements.len());
  let first_err: Arc<Mutex<Option<TaskError>>> = Arc::new(Mutex::new(None));

  debug!(elements = elements.len(), workers = limit, "starting pool");

  let pool_handle = handle.clone();
  tokio::spawn(async move {
    let mut workers = Vec::with_capacity(limit);

    for i in 0..limit {
      let fut = worker(
        child.clone(),
        stop.clone(),
        rx.clone(),
        op.clone(),
        op_done.clone(),
        first_err.clone(),
      );
      workers.push(tokio::spawn(
        fut.instrument(info_span!("pool_worker", worker = i + 1)),
      ));
    }
    drop(rx);

    // Pre-filling then closing the queue guarantees each element is delivered at
    // most once and lets workers treat closed-and-empty as the clean drain exit.
    for elem in elements {
      if tx.send(elem).await.is_err() {
        break;
      }
    }
    let _ = tx.close();

    for worker in workers {
      let _ = worker.await;
    }
    child.cancel();

    let result = match first_err.lock().take() {
      Some(err) => Err(err),
      None => Ok(()),
    };
    pool_handle.complete(result);
  });

  handle
}

/// One worker: loops over the queue and, on failure, records the error into the
/// shared write-once slot and cancels the sibling scope.
async fn worker<T, R>(
  scope: CancellationToken,
  stop: CancellationToken,
  queue: AsyncReceiver<T>,
  op: ComputeFn<T, R>,
  op_done: Option<FinalizeFn<R>>,
  first_err: Arc<Mutex<Option<TaskError>>>,
) where
  T: Send + 'static,
  R: Send + 'static,
{
  if let Err(err) = worker_loop(&scope, &stop, &queue, &op, op_done.as_ref()).await {
    let mut slot = first_err.lock();
    if slot.is_none() {
      *slot = Some(err);
    }
    drop(slot);

    scope.cancel();
  }
  trace!("worker exited");
}

async fn worker_loop<T, R>(
  scope: &CancellationToken,
  stop: &CancellationToken,
  queue: &AsyncReceiver<T>,
  op: &ComputeFn<T, R>,
  op_done: Option<&FinalizeFn<R>>,
) -> Result<(), TaskError>
where
  T: Send + 'static,
  R: Send + 'static,
{
  loop {
    tokio::select! {
      _ = stop.cancelled() => return Ok(()),
      _ = scope.cancelled() => return Ok(()),
      recv = queue.recv() => {
        let elem = match recv {
          Ok(elem) => elem,
          // Closed and empty: the queue is drained.
          Err(_) => return Ok(()),
        };

        let result = op(scope.clone(), elem).await?;

        let Some(finalize) = op_done else {
          continue;
        };

        // The compute phase may have outlived a stop or a sibling failure; check
        // without blocking before handing its result to the finalize phase.
        if stop.is_cancelled() || scope.is_cancelled() {
          return Ok(());
        }

        finalize(scope.clone(), result).await?;
      }
    }
  }
}
