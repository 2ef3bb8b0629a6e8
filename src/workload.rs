//! Simulated Workload
//!
//! Demo collaborators for the pipeline: a generator producing
//! randomized-latency, randomized-outcome tasks, and a traffic driver that
//! burst-calls admission on a fixed cadence. Neither is part of the core;
//! the pipeline only ever sees opaque tasks.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{AdmitError, FlowPipeline};
use crate::task::Task;

/// Shape of the simulated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Minimum simulated task latency (ms).
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    /// Maximum simulated task latency (ms).
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Percentage of tasks that fail (0-100).
    #[serde(default = "default_failure_percent")]
    pub failure_percent: u8,
}

fn default_min_latency_ms() -> u64 {
    10
}

fn default_max_latency_ms() -> u64 {
    150
}

fn default_failure_percent() -> u8 {
    10
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            failure_percent: default_failure_percent(),
        }
    }
}

/// Build one simulated task.
///
/// Latency and outcome are decided up front so the task body stays Send.
pub fn simulated_task(config: &WorkloadConfig) -> Task {
    let mut rng = rand::thread_rng();
    let latency_ms = rng.gen_range(config.min_latency_ms..=config.max_latency_ms);
    let fails = rng.gen_range(0u8..100) < config.failure_percent;

    Task::new(async move {
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        if fails {
            Err("simulated failure".into())
        } else {
            Ok(())
        }
    })
}

/// What the traffic driver saw at the admission boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    pub submitted: u64,
    pub accepted: u64,
    pub rate_limited: u64,
    pub shed: u64,
}

/// Burst-call `accept` every `burst_interval` for `duration`.
pub async fn drive(
    pipeline: &FlowPipeline,
    workload: &WorkloadConfig,
    burst_size: u32,
    burst_interval: Duration,
    duration: Duration,
) -> TrafficReport {
    let mut report = TrafficReport::default();
    let deadline = tokio::time::Instant::now() + duration;
    // interval() panics on zero, and the cadence comes from a CLI flag.
    let mut ticker = tokio::time::interval(burst_interval.max(Duration::from_millis(1)));

    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;

        for _ in 0..burst_size {
            report.submitted += 1;
            match pipeline.accept(simulated_task(workload)) {
                Ok(id) => {
                    report.accepted += 1;
                    debug!(task_id = %id, "task accepted");
                }
                Err(AdmitError::RateLimited) => report.rate_limited += 1,
                Err(AdmitError::QueueFull { .. }) => report.shed += 1,
            }
        }
    }

    report
}
