use taskling::{run_periodically, PeriodicOptions, RetryError, TaskError};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,taskling=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

#[tokio::test]
async fn runs_on_a_fixed_cadence_until_stopped() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));

  let counter = runs.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    },
    Duration::from_millis(20),
    &stop,
    PeriodicOptions::default(),
  );

  sleep(Duration::from_millis(90)).await;
  stop.cancel();

  assert_eq!(handle.wait().await, Ok(()));
  let count = runs.load(Ordering::SeqCst);
  // ~90ms at a 20ms cadence: invocations at 0, 20, 40, 60, 80 with in-flight slack.
  assert!((3..=6).contains(&count), "expected 3..=6 invocations, got {}", count);
}

#[tokio::test]
async fn default_classification_stops_on_the_first_error() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));

  let counter = runs.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::fail("db down"))
      }
    },
    Duration::from_millis(5),
    &stop,
    PeriodicOptions::default(),
  );

  assert_eq!(handle.wait().await, Err(TaskError::fail("db down")));
  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn explicit_stop_hook_halts_after_one_invocation() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));

  let counter = runs.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::fail("error"))
      }
    },
    Duration::from_millis(5),
    &stop,
    PeriodicOptions::default().with_on_error(|_| false),
  );

  assert_eq!(handle.wait().await, Err(TaskError::fail("error")));
  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retryable_errors_continue_until_a_fatal_one() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));
  let notified: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

  let counter = runs.clone();
  let observed = notified.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let counter = counter.clone();
      async move {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
          Err(TaskError::fail("flaky"))
        } else {
          Err(TaskError::fatal("gone for good"))
        }
      }
    },
    Duration::from_millis(5),
    &stop,
    PeriodicOptions::default()
      .with_on_error(|outcome: &RetryError| outcome.is_retryable())
      .with_notify_on_error(move |outcome: &RetryError| {
        observed.lock().push(outcome.to_string());
      }),
  );

  assert_eq!(handle.wait().await, Err(TaskError::fatal("gone for good")));
  assert_eq!(runs.load(Ordering::SeqCst), 3);
  // The notify hook fires before each retry, i.e. for the two flaky failures only.
  assert_eq!(notified.lock().len(), 2);
}

#[tokio::test]
async fn stop_during_the_interval_sleep_completes_cleanly() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let runs = Arc::new(AtomicUsize::new(0));

  let counter = runs.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    },
    Duration::from_millis(300),
    &stop,
    PeriodicOptions::default(),
  );

  sleep(Duration::from_millis(40)).await;
  stop.cancel();

  assert_eq!(handle.wait().await, Ok(()));
  assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invocations_never_overlap() {
  setup_tracing_for_test();
  let ctx = CancellationToken::new();
  let stop = CancellationToken::new();
  let active = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let runs = Arc::new(AtomicUsize::new(0));

  let op_active = active.clone();
  let op_peak = peak.clone();
  let op_runs = runs.clone();
  let handle = run_periodically(
    &ctx,
    move |_scope| {
      let active = op_active.clone();
      let peak = op_peak.clone();
      let runs = op_runs.clone();
      async move {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(30)).await;
        active.fetch_sub(1, Ordering::SeqCst);
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    },
    Duration::from_millis(10),
    &stop,
    PeriodicOptions::default(),
  );

  sleep(Duration::from_millis(150)).await;
  stop.cancel();

  assert_eq!(handle.wait().await, Ok(()));
  assert!(runs.load(Ordering::SeqCst) >= 2, "expected at least two full invocations");
  assert_eq!(peak.load(Ordering::SeqCst), 1, "periodic invocations must be strictly sequential");
}
