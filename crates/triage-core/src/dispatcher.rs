//! Bounded-parallelism task waves.
//!
//! A [`Dispatcher`] runs one wave: construct it, [`submit`](Dispatcher::submit)
//! any number of tasks, then [`wait`](Dispatcher::wait). `wait` consumes the
//! dispatcher, so the next wave always starts from a fresh one.
//!
//! At most `max_concurrency` tasks run at once (a [`Semaphore`] permit is
//! held for the duration of each task). Task errors and panics never cancel
//! sibling tasks; they are collected and returned together in the
//! [`WaveReport`] once every task of the wave has finished.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::{Result, TriageError};
use crate::obs::emit_wave_finished;

/// Number of available processing units, the default wave width.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Why a task did not produce a value.
#[derive(Debug)]
pub enum TaskFault {
    /// The task returned an error.
    Failed(TriageError),
    /// The task panicked; holds the panic message.
    Panicked(String),
    /// The task was cancelled before completing (runtime shutdown).
    Cancelled(String),
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFault::Failed(err) => write!(f, "{err}"),
            TaskFault::Panicked(msg) => write!(f, "panicked: {msg}"),
            TaskFault::Cancelled(msg) => write!(f, "cancelled: {msg}"),
        }
    }
}

/// A failed task, labelled with the input it was submitted with.
#[derive(Debug)]
pub struct TaskFailure {
    pub label: String,
    pub fault: TaskFault,
}

impl TaskFailure {
    /// Convert into a domain error, keeping the original error when the task
    /// itself returned one.
    pub fn into_error(self) -> TriageError {
        match self.fault {
            TaskFault::Failed(err) => err,
            TaskFault::Panicked(message) | TaskFault::Cancelled(message) => {
                TriageError::TaskAborted {
                    label: self.label,
                    message,
                }
            }
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.fault)
    }
}

/// Everything a drained wave produced.
#[derive(Debug)]
pub struct WaveReport<T> {
    pub wave: String,
    pub submitted: usize,
    /// Values of successful tasks, in completion order.
    pub completed: Vec<T>,
    pub failures: Vec<TaskFailure>,
}

impl<T> WaveReport<T> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary of every failure, `label: cause; ...`.
    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

struct TaskOutcome<T> {
    label: String,
    result: std::result::Result<T, TaskFault>,
}

/// Runs one wave of tasks under a concurrency bound.
pub struct Dispatcher<T> {
    wave: String,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<TaskOutcome<T>>,
    submitted: usize,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// New wave named `wave` running at most `max_concurrency` tasks at once.
    /// A bound of zero is treated as one.
    pub fn new(wave: impl Into<String>, max_concurrency: usize) -> Self {
        Self {
            wave: wave.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    /// Submit a task. `input` is moved into the task and handed to `task`
    /// when a permit is available; its `Display` form labels any failure.
    /// The task runs inside the caller's current span.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<I, F, Fut>(&mut self, input: I, task: F)
    where
        I: fmt::Display + Send + 'static,
        F: FnOnce(I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let label = input.to_string();
        let semaphore = Arc::clone(&self.semaphore);
        let span = tracing::Span::current();
        self.submitted += 1;

        let wrapped = async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(closed) => {
                    return TaskOutcome {
                        label,
                        result: Err(TaskFault::Cancelled(closed.to_string())),
                    }
                }
            };

            let run = AssertUnwindSafe(async move { task(input).await });
            let result = match run.catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskFault::Failed(err)),
                Err(payload) => Err(TaskFault::Panicked(panic_message(payload.as_ref()))),
            };
            TaskOutcome { label, result }
        };
        self.tasks.spawn(wrapped.instrument(span));
    }

    /// Number of tasks submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Block until every submitted task has finished and report the results.
    pub async fn wait(mut self) -> WaveReport<T> {
        let mut completed = Vec::with_capacity(self.submitted);
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(TaskOutcome {
                    result: Ok(value), ..
                }) => completed.push(value),
                Ok(TaskOutcome {
                    label,
                    result: Err(fault),
                }) => failures.push(TaskFailure { label, fault }),
                // Panics are caught inside the task, so only cancellation lands here.
                Err(join_err) => failures.push(TaskFailure {
                    label: format!("{}:unknown", self.wave),
                    fault: TaskFault::Cancelled(join_err.to_string()),
                }),
            }
        }

        emit_wave_finished(&self.wave, completed.len(), failures.len());

        WaveReport {
            wave: self.wave,
            submitted: self.submitted,
            completed,
            failures,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[derive(Default)]
    struct InFlight {
        now: AtomicUsize,
        max: AtomicUsize,
    }

    impl InFlight {
        fn enter(&self) {
            let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.now.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_wave_collects_every_value() {
        let mut wave = Dispatcher::new("double", 3);
        for n in 0..10u32 {
            wave.submit(n, |n| async move { Ok::<_, TriageError>(n * 2) });
        }
        assert_eq!(wave.submitted(), 10);

        let report = wave.wait().await;
        assert!(report.is_clean());
        let mut values = report.completed;
        values.sort();
        assert_eq!(values, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_bound() {
        let tracker = Arc::new(InFlight::default());
        let mut wave = Dispatcher::new("bounded", 2);
        for n in 0..8u32 {
            let tracker = Arc::clone(&tracker);
            wave.submit(n, move |n| async move {
                tracker.enter();
                sleep(Duration::from_millis(20)).await;
                tracker.exit();
                Ok::<_, TriageError>(n)
            });
        }
        let report = wave.wait().await;
        assert_eq!(report.completed.len(), 8);
        let max = tracker.max.load(Ordering::SeqCst);
        assert!(max <= 2, "max in flight was {max}");
        assert!(max >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tasks_actually_run_concurrently() {
        let tracker = Arc::new(InFlight::default());
        let mut wave = Dispatcher::new("parallel", 4);
        for n in 0..4u32 {
            let tracker = Arc::clone(&tracker);
            wave.submit(n, move |n| async move {
                tracker.enter();
                sleep(Duration::from_millis(50)).await;
                tracker.exit();
                Ok::<_, TriageError>(n)
            });
        }
        wave.wait().await;
        assert!(tracker.max.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        let mut wave = Dispatcher::new("mixed", 2);
        for n in 0..6u32 {
            wave.submit(n, |n| async move {
                if n == 3 {
                    Err(TriageError::WriteFailure {
                        board: "4".to_string(),
                        url: format!("u{n}"),
                        detail: "rejected".to_string(),
                    })
                } else {
                    Ok(n)
                }
            });
        }
        let report = wave.wait().await;
        assert_eq!(report.completed.len(), 5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "3");
        assert!(report.failure_summary().contains("rejected"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_not_lost() {
        let mut wave = Dispatcher::new("panics", 2);
        wave.submit("ok".to_string(), |_| async move { Ok::<_, TriageError>(1u32) });
        wave.submit("boom".to_string(), |_| async move {
            if true {
                panic!("exploded");
            }
            Ok::<_, TriageError>(2u32)
        });
        let report = wave.wait().await;
        assert_eq!(report.completed, vec![1]);
        assert_eq!(report.failures.len(), 1);
        let failure = report.failures.into_iter().next().unwrap();
        assert_eq!(failure.label, "boom");
        assert!(matches!(&failure.fault, TaskFault::Panicked(msg) if msg.contains("exploded")));
        assert!(matches!(
            failure.into_error(),
            TriageError::TaskAborted { label, .. } if label == "boom"
        ));
    }

    #[tokio::test]
    async fn test_empty_wave_drains_immediately() {
        let wave: Dispatcher<()> = Dispatcher::new("empty", 4);
        let report = wave.wait().await;
        assert_eq!(report.submitted, 0);
        assert!(report.completed.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_zero_bound_still_makes_progress() {
        let mut wave = Dispatcher::new("zero", 0);
        wave.submit(1u32, |n| async move { Ok::<_, TriageError>(n) });
        let report = wave.wait().await;
        assert_eq!(report.completed, vec![1]);
    }

    #[test]
    fn test_default_concurrency_is_positive() {
        assert!(default_concurrency() >= 1);
    }
}
