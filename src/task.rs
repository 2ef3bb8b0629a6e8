//! Task Abstraction
//!
//! A task is an opaque unit of work: a boxed future producing a result,
//! tagged with an identity and its submission time. Tasks are owned by the
//! queue until dequeued, then by the executing worker slot until terminal.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use uuid::Uuid;

/// Boxed error produced by a failing task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for task bodies.
pub type TaskResult = Result<(), TaskError>;

/// An opaque unit of work.
///
/// Consumed exactly once by the worker pump and discarded after it settles.
pub struct Task {
    id: Uuid,
    submitted_at: Instant,
    work: BoxFuture<'static, TaskResult>,
}

impl Task {
    /// Wrap a future into a task with a fresh id.
    pub fn new<F>(work: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            submitted_at: Instant::now(),
            work: work.boxed(),
        }
    }

    /// Unique task id, assigned at creation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Instant the task was created (admission time).
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub(crate) fn into_parts(self) -> (Uuid, Instant, BoxFuture<'static, TaskResult>) {
        (self.id, self.submitted_at, self.work)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}
