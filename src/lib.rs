//! flowgate - an admission-controlled task pipeline
//!
//! Composes a token-bucket rate limiter, a bounded FIFO queue, a
//! concurrency limiter, a per-task timeout, and a worker pump into one
//! in-process flow-control unit with periodic observability.

pub mod admission;
pub mod cli;
pub mod config;
pub mod limiter;
pub mod observer;
pub mod pipeline;
pub mod pump;
pub mod queue;
pub mod slow_task;
pub mod task;
pub mod timeout;
pub mod workload;
