//! Concurrency Limiter
//!
//! Caps the number of simultaneously executing tasks regardless of queue
//! depth. Permits are RAII guards: release happens on drop, on every exit
//! path including task failure and timeout, so double-release is
//! unrepresentable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting limiter over task concurrency.
///
/// Waiters are woken in FIFO order (the underlying semaphore is fair).
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    max_concurrency: usize,
}

/// Held permit for one executing task. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Release);
    }
}

impl ConcurrencyLimiter {
    /// # Panics
    ///
    /// Panics if `max_concurrency` is 0.
    pub fn new(max_concurrency: usize) -> Self {
        assert!(max_concurrency > 0, "max_concurrency must be greater than 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrency,
        }
    }

    /// Acquire a permit, suspending until one is available.
    pub async fn acquire(&self) -> ConcurrencyPermit {
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        ConcurrencyPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Acquire a permit without suspending, or None when exhausted.
    pub fn try_acquire(&self) -> Option<ConcurrencyPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        Some(ConcurrencyPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Configured concurrency cap.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_in_flight_never_exceeds_cap() {
        let limiter = ConcurrencyLimiter::new(2);

        let p1 = limiter.acquire().await;
        let _p2 = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 2);
        assert!(limiter.try_acquire().is_none());

        drop(p1);
        assert_eq!(limiter.in_flight(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_third_acquire_waits_for_release() {
        let limiter = Arc::new(ConcurrencyLimiter::new(2));

        let p1 = limiter.acquire().await;
        let _p2 = limiter.acquire().await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(p1);
        let _p3 = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter never resolved")
            .unwrap();
        assert_eq!(limiter.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop_in_any_path() {
        let limiter = ConcurrencyLimiter::new(1);

        {
            let _permit = limiter.acquire().await;
            assert_eq!(limiter.in_flight(), 1);
        }
        assert_eq!(limiter.in_flight(), 0);
    }
}
