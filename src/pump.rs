//! Worker Pump
//!
//! The scheduling loop between the queue and execution: each worker
//! dequeues a task, acquires a concurrency permit, runs the task under the
//! timeout, records the outcome, and releases the permit. One worker loop
//! is spawned per concurrency slot so permits are actually utilized.
//!
//! Tasks are dequeued in FIFO order but may complete out of order. One
//! failing or timing-out task never halts the pump: every outcome is
//! recorded and recovered locally.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::limiter::ConcurrencyLimiter;
use crate::queue::BoundedQueue;
use crate::slow_task::SlowTaskConfig;
use crate::task::Task;
use crate::timeout::{run_with_timeout, TaskOutcome};

/// Execution counters. Every dequeued task settles into exactly one of
/// completed/failed/timed_out.
#[derive(Debug, Default)]
pub struct PumpCounters {
    pub dequeued: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
}

impl PumpCounters {
    /// Snapshot of current counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            dequeued: self.dequeued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the pump counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub dequeued: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl CounterSnapshot {
    /// Tasks that reached a terminal outcome.
    pub fn settled(&self) -> u64 {
        self.completed + self.failed + self.timed_out
    }
}

/// Pump over a shared queue and limiter.
pub struct WorkerPump {
    queue: Arc<BoundedQueue<Task>>,
    limiter: Arc<ConcurrencyLimiter>,
    counters: Arc<PumpCounters>,
    task_timeout: Duration,
    slow_task: SlowTaskConfig,
    shutdown: CancellationToken,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPump {
    pub fn new(
        queue: Arc<BoundedQueue<Task>>,
        limiter: Arc<ConcurrencyLimiter>,
        task_timeout: Duration,
        slow_task: SlowTaskConfig,
    ) -> Self {
        Self {
            queue,
            limiter,
            counters: Arc::new(PumpCounters::default()),
            task_timeout,
            slow_task,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn one pump loop per concurrency slot. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut handles = self.handles.lock().unwrap();
        for worker in 0..self.limiter.max_concurrency() {
            handles.push(tokio::spawn(pump_loop(
                worker,
                Arc::clone(&self.queue),
                Arc::clone(&self.limiter),
                Arc::clone(&self.counters),
                self.task_timeout,
                self.slow_task.clone(),
                self.shutdown.clone(),
            )));
        }
    }

    /// Whether pump loops are active.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Stop pumping: loops exit at their next scheduling point, and a task
    /// already being executed finishes naturally before its worker exits.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            if let Err(error) = handle.await {
                warn!(error = %error, "pump worker terminated abnormally");
            }
        }
    }
}

async fn pump_loop(
    worker: usize,
    queue: Arc<BoundedQueue<Task>>,
    limiter: Arc<ConcurrencyLimiter>,
    counters: Arc<PumpCounters>,
    task_timeout: Duration,
    slow_task: SlowTaskConfig,
    shutdown: CancellationToken,
) {
    debug!(worker, "pump worker started");

    loop {
        let task = match queue.poll() {
            Some(task) => task,
            None => {
                if shutdown.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = queue.item_available() => continue,
                    _ = shutdown.cancelled() => break,
                }
            }
        };

        counters.dequeued.fetch_add(1, Ordering::Relaxed);
        let permit = limiter.acquire().await;

        let (id, _submitted_at, work) = task.into_parts();
        let started = Instant::now();
        let outcome = run_with_timeout(work, task_timeout).await;
        let elapsed = started.elapsed();

        match &outcome {
            TaskOutcome::Completed => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Failed(error) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(task_id = %id, error = %error, "task failed");
            }
            TaskOutcome::TimedOut => {
                counters.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    task_id = %id,
                    timeout_ms = task_timeout.as_millis() as u64,
                    "task timed out"
                );
            }
        }

        if slow_task.is_slow(elapsed) {
            warn!(
                task_id = %id,
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = slow_task.threshold_ms,
                outcome = outcome.label(),
                "slow task"
            );
        }

        drop(permit);

        if shutdown.is_cancelled() {
            break;
        }
    }

    debug!(worker, "pump worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn pump(
        queue_capacity: usize,
        max_concurrency: usize,
        timeout_ms: u64,
    ) -> (Arc<BoundedQueue<Task>>, WorkerPump) {
        let queue = Arc::new(BoundedQueue::new(queue_capacity));
        let limiter = Arc::new(ConcurrencyLimiter::new(max_concurrency));
        let pump = WorkerPump::new(
            Arc::clone(&queue),
            limiter,
            Duration::from_millis(timeout_ms),
            SlowTaskConfig::disabled(),
        );
        (queue, pump)
    }

    #[tokio::test]
    async fn test_slow_task_counts_timed_out_not_completed() {
        let (queue, pump) = pump(8, 1, 50);
        pump.start();

        assert!(queue.offer(Task::new(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })));

        wait_for(|| pump.counters().settled() == 1, Duration::from_secs(2)).await;
        let counters = pump.counters();
        assert_eq!(counters.timed_out, 1);
        assert_eq!(counters.completed, 0);

        pump.shutdown().await;
    }

    #[tokio::test]
    async fn test_counter_conservation_after_drain() {
        let (queue, pump) = pump(32, 4, 100);
        pump.start();

        for _ in 0..4 {
            assert!(queue.offer(Task::new(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            })));
            assert!(queue.offer(Task::new(async { Err("expected failure".into()) })));
            assert!(queue.offer(Task::new(async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(())
            })));
        }

        wait_for(|| pump.counters().settled() == 12, Duration::from_secs(5)).await;
        let counters = pump.counters();
        assert_eq!(counters.completed, 4);
        assert_eq!(counters.failed, 4);
        assert_eq!(counters.timed_out, 4);
        assert_eq!(counters.settled(), counters.dequeued);

        pump.shutdown().await;
    }

    #[tokio::test]
    async fn test_tasks_start_in_fifo_order() {
        let (queue, pump) = pump(16, 1, 1000);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            assert!(queue.offer(Task::new(async move {
                order.lock().unwrap().push(i);
                Ok(())
            })));
        }

        pump.start();
        wait_for(|| pump.counters().settled() == 5, Duration::from_secs(2)).await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);

        pump.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_task_does_not_halt_pump() {
        let (queue, pump) = pump(8, 2, 500);
        pump.start();

        assert!(queue.offer(Task::new(async { panic!("isolated panic") })));
        assert!(queue.offer(Task::new(async { Ok(()) })));

        wait_for(|| pump.counters().settled() == 2, Duration::from_secs(2)).await;
        let counters = pump.counters();
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.completed, 1);

        pump.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_dequeuing() {
        let (queue, pump) = pump(8, 2, 500);
        pump.start();
        assert!(pump.is_running());

        pump.shutdown().await;
        assert!(!pump.is_running());

        assert!(queue.offer(Task::new(async { Ok(()) })));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pump.counters().dequeued, 0);
        assert_eq!(queue.len(), 1);
    }
}
