//! Flow Pipeline
//!
//! Composition root for the admission-controlled pipeline: rate limiter in
//! front of a bounded queue, drained by the worker pump under a concurrency
//! cap and per-task timeout.
//!
//! The two admission gates are independent on purpose: a bursty but
//! low-average-rate caller can still overflow a small queue, and a steady
//! high-rate caller should be throttled before it ever reaches the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::admission::AdmissionController;
use crate::config::FlowgateConfig;
use crate::limiter::ConcurrencyLimiter;
use crate::observer::{LoadStatus, StatusSnapshot};
use crate::pump::{CounterSnapshot, WorkerPump};
use crate::queue::BoundedQueue;
use crate::task::Task;

/// Admission rejections.
///
/// Both are expected, retryable outcomes. They carry distinct codes so
/// callers and operators can tell "too fast" from "too much backlog".
#[derive(Debug, Error)]
pub enum AdmitError {
    /// Token bucket empty. Slow down and retry later.
    #[error("rate limit exceeded. Slow down and try again later.")]
    RateLimited,

    /// Queue at capacity; the request was shed. Try again later.
    #[error("task queue full: {depth} pending, {capacity} max. Try again later.")]
    QueueFull { depth: usize, capacity: usize },
}

impl AdmitError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AdmitError::RateLimited => "RATE_LIMITED",
            AdmitError::QueueFull { .. } => "QUEUE_FULL",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            AdmitError::RateLimited => 429,
            AdmitError::QueueFull { .. } => 503,
        }
    }

    /// Is this error recoverable by retrying later?
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Suggested retry delay in ms.
    pub fn retry_after_ms(&self) -> u64 {
        match self {
            AdmitError::RateLimited => 100,
            AdmitError::QueueFull { .. } => 500,
        }
    }
}

/// Admission counters.
#[derive(Debug, Default)]
pub struct AdmissionCounters {
    pub accepted: AtomicU64,
    pub rate_limited: AtomicU64,
    pub shed: AtomicU64,
}

impl AdmissionCounters {
    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            shed: self.shed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the admission counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionSnapshot {
    pub accepted: u64,
    pub rate_limited: u64,
    pub shed: u64,
}

/// The assembled pipeline.
pub struct FlowPipeline {
    admission: AdmissionController,
    queue: Arc<BoundedQueue<Task>>,
    limiter: Arc<ConcurrencyLimiter>,
    pump: WorkerPump,
    admission_counters: AdmissionCounters,
    warning_threshold_percent: u8,
    critical_threshold_percent: u8,
}

impl FlowPipeline {
    /// Assemble a pipeline from validated configuration.
    pub fn new(config: &FlowgateConfig) -> Self {
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let limiter = Arc::new(ConcurrencyLimiter::new(config.max_concurrency));
        let pump = WorkerPump::new(
            Arc::clone(&queue),
            Arc::clone(&limiter),
            Duration::from_millis(config.task_timeout_ms),
            config.slow_task.clone(),
        );

        Self {
            admission: AdmissionController::new(config.rate_per_second, config.burst_capacity),
            queue,
            limiter,
            pump,
            admission_counters: AdmissionCounters::default(),
            warning_threshold_percent: config.warning_threshold_percent,
            critical_threshold_percent: config.critical_threshold_percent,
        }
    }

    /// Start the worker pump.
    pub fn start(&self) {
        self.pump.start();
    }

    /// Two-stage admission: rate gate first, then the queue offer.
    ///
    /// On success the task id is returned and execution is fire-and-forget;
    /// outcomes surface through counters and logs, not to this caller.
    pub fn accept(&self, task: Task) -> Result<Uuid, AdmitError> {
        if !self.admission.try_admit() {
            self.admission_counters
                .rate_limited
                .fetch_add(1, Ordering::Relaxed);
            return Err(AdmitError::RateLimited);
        }

        let id = task.id();
        if !self.queue.offer(task) {
            self.admission_counters.shed.fetch_add(1, Ordering::Relaxed);
            warn!(
                queue_capacity = self.queue.capacity(),
                "request shed: queue full"
            );
            return Err(AdmitError::QueueFull {
                depth: self.queue.len(),
                capacity: self.queue.capacity(),
            });
        }

        self.admission_counters
            .accepted
            .fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.pump.counters()
    }

    pub fn admission_counters(&self) -> AdmissionSnapshot {
        self.admission_counters.snapshot()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }

    /// Tokens remaining in the rate gate, or None when the gate is disabled.
    pub fn tokens_remaining(&self) -> Option<f64> {
        self.admission.tokens_remaining()
    }

    pub fn is_running(&self) -> bool {
        self.pump.is_running()
    }

    /// Classify current load from queue and concurrency utilization.
    pub fn load_status(&self) -> LoadStatus {
        let queue_percent = percent(self.queue.len(), self.queue.capacity());
        let concurrency_percent = percent(self.limiter.in_flight(), self.limiter.max_concurrency());
        let max_percent = queue_percent.max(concurrency_percent);

        if max_percent >= self.critical_threshold_percent {
            LoadStatus::Critical
        } else if max_percent >= self.warning_threshold_percent {
            LoadStatus::Warning
        } else {
            LoadStatus::Normal
        }
    }

    /// Full status snapshot for the observer.
    pub fn status(&self) -> StatusSnapshot {
        let counters = self.pump.counters();
        let admission = self.admission_counters.snapshot();

        StatusSnapshot {
            timestamp: chrono::Utc::now(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            in_flight: self.limiter.in_flight(),
            max_concurrency: self.limiter.max_concurrency(),
            accepted: admission.accepted,
            rate_limited: admission.rate_limited,
            shed: admission.shed,
            completed: counters.completed,
            failed: counters.failed,
            timed_out: counters.timed_out,
            tokens_remaining: self.admission.tokens_remaining(),
            load_status: self.load_status(),
        }
    }

    /// Wait until every dequeued task has settled and the queue is empty.
    pub async fn drain(&self) {
        loop {
            let counters = self.pump.counters();
            if self.queue.is_empty() && counters.settled() == counters.dequeued {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop the pump. In-flight tasks finish naturally.
    pub async fn shutdown(&self) {
        self.pump.shutdown().await;
    }
}

fn percent(current: usize, limit: usize) -> u8 {
    if limit == 0 {
        return 0;
    }
    ((current as f64 / limit as f64) * 100.0) as u8
}
