//! Observer
//!
//! Periodic sampler over the pipeline: emits a structured status line with
//! queue depth, in-flight count, outcome counters, remaining tokens, and a
//! derived load classification. The snapshot is also a serializable struct
//! for programmatic consumption.
//!
//! Sampling never blocks the pipeline; it only reads gauges and counters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pipeline::FlowPipeline;

/// System load status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// System is operating normally.
    Normal,
    /// System is approaching limits.
    Warning,
    /// System is at or near capacity.
    Critical,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Normal => "normal",
            LoadStatus::Warning => "warning",
            LoadStatus::Critical => "critical",
        }
    }
}

/// Point-in-time status of the whole pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub in_flight: usize,
    pub max_concurrency: usize,
    pub accepted: u64,
    pub rate_limited: u64,
    pub shed: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// None when the rate gate is disabled.
    pub tokens_remaining: Option<f64>,
    pub load_status: LoadStatus,
}

/// Periodic status reporter.
pub struct Observer {
    pipeline: Arc<FlowPipeline>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Observer {
    pub fn new(pipeline: Arc<FlowPipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the sampling loop.
    pub fn spawn(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let interval = self.interval;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => emit(&pipeline),
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    /// Stop the sampling loop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

fn emit(pipeline: &FlowPipeline) {
    let status = pipeline.status();
    info!(
        queue_depth = status.queue_depth,
        queue_capacity = status.queue_capacity,
        in_flight = status.in_flight,
        max_concurrency = status.max_concurrency,
        accepted = status.accepted,
        rate_limited = status.rate_limited,
        shed = status.shed,
        completed = status.completed,
        failed = status.failed,
        timed_out = status.timed_out,
        tokens_remaining = ?status.tokens_remaining,
        load_status = status.load_status.as_str(),
        "pipeline status"
    );
}
