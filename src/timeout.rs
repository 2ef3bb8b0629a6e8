//! Timeout Wrapper
//!
//! Races a task against a wall-clock deadline and classifies the result.
//! When the deadline fires first the task future is dropped, so cancellation
//! is cooperative at the task's next await point and the concurrency slot is
//! genuinely freed. A panicking task settles as a failure instead of
//! unwinding into the pump loop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;

use crate::task::{TaskError, TaskResult};

/// Terminal state of one executed task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The task's own operation resolved Ok.
    Completed,
    /// The task's own operation resolved Err or panicked.
    Failed(TaskError),
    /// The deadline fired before the task settled.
    TimedOut,
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::TimedOut => "timed_out",
        }
    }
}

/// Run `work` with an upper bound on wall-clock time.
pub async fn run_with_timeout<F>(work: F, limit: Duration) -> TaskOutcome
where
    F: Future<Output = TaskResult>,
{
    let guarded = AssertUnwindSafe(work).catch_unwind();

    match tokio::time::timeout(limit, guarded).await {
        Ok(Ok(Ok(()))) => TaskOutcome::Completed,
        Ok(Ok(Err(error))) => TaskOutcome::Failed(error),
        Ok(Err(panic)) => TaskOutcome::Failed(panic_message(panic)),
        Err(_elapsed) => TaskOutcome::TimedOut,
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> TaskError {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {}", message).into()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {}", message).into()
    } else {
        "task panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_task_completes() {
        let outcome = run_with_timeout(async { Ok(()) }, Duration::from_millis(100)).await;
        assert!(matches!(outcome, TaskOutcome::Completed));
    }

    #[tokio::test]
    async fn test_failing_task_is_failed() {
        let outcome =
            run_with_timeout(async { Err("boom".into()) }, Duration::from_millis(100)).await;
        match outcome {
            TaskOutcome::Failed(error) => assert_eq!(error.to_string(), "boom"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_task_times_out() {
        let outcome = run_with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(outcome, TaskOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_panicking_task_is_failed() {
        let outcome =
            run_with_timeout(async { panic!("kaboom") }, Duration::from_millis(100)).await;
        match outcome {
            TaskOutcome::Failed(error) => assert!(error.to_string().contains("kaboom")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(TaskOutcome::Completed.label(), "completed");
        assert_eq!(TaskOutcome::Failed("x".into()).label(), "failed");
        assert_eq!(TaskOutcome::TimedOut.label(), "timed_out");
    }
}
