//! Admission Control
//!
//! Token-bucket rate limiting for the pipeline's front gate.
//! - Configurable sustained rate and burst capacity
//! - Rejection is a normal outcome signaled by a boolean, never an error
//! - Clock-injectable for deterministic tests

use std::sync::Mutex;
use std::time::Instant;

/// Token bucket for rate limiting.
///
/// Tokens accrue at `rate` per second up to `capacity` and each admitted
/// request consumes exactly one. The refill timestamp only advances once at
/// least one whole token has accrued, so sub-token intervals are re-measured
/// from the previous refill rather than accumulated.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(rate_per_second: f64, capacity: f64) -> Self {
        Self::new_at(rate_per_second, capacity, Instant::now())
    }

    /// Create a bucket with an explicit creation instant.
    ///
    /// The real-clock constructor delegates here; tests and simulations can
    /// pin the clock instead.
    pub fn new_at(rate_per_second: f64, capacity: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            rate: rate_per_second,
            last_refill: now,
        }
    }

    /// Try to admit one request against the real clock.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Try to admit one request as of `now`.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let accrued = elapsed * self.rate;

        // Refill only once a whole token has accrued; last_refill holds
        // position until then.
        if accrued >= 1.0 {
            self.tokens = (self.tokens + accrued).min(self.capacity);
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available.
    pub fn available(&self) -> f64 {
        self.tokens
    }

    /// Maximum burst capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Rate gate in front of the queue.
///
/// A rate of 0 disables the gate entirely: every request is admitted.
pub struct AdmissionController {
    bucket: Mutex<Option<TokenBucket>>,
}

impl AdmissionController {
    pub fn new(rate_per_second: u32, burst_capacity: u32) -> Self {
        let bucket = if rate_per_second > 0 {
            Some(TokenBucket::new(
                rate_per_second as f64,
                burst_capacity as f64,
            ))
        } else {
            None
        };

        Self {
            bucket: Mutex::new(bucket),
        }
    }

    /// Try to admit one request. Rejection means "too fast, retry later".
    pub fn try_admit(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap();
        match bucket.as_mut() {
            Some(bucket) => bucket.allow(),
            None => true,
        }
    }

    /// Tokens remaining, or `None` when the gate is disabled.
    pub fn tokens_remaining(&self) -> Option<f64> {
        self.bucket.lock().unwrap().as_ref().map(TokenBucket::available)
    }
}
