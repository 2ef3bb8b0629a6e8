//! Bounded Task Queue
//!
//! Fixed-capacity FIFO buffer between admission and execution.
//! - `offer` returning false is the explicit load-shedding signal
//! - Items are never reordered and never dropped except via offer rejection
//! - Consumers park on a notifier instead of busy-polling

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// Fixed-capacity FIFO queue.
///
/// Thread-safe: producers and consumers may call from any task or thread.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be greater than 0");

        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Notify::new(),
        }
    }

    /// Append an item, or refuse it when the queue is at capacity.
    ///
    /// Returns false iff `len() == capacity` at call time. Callers must
    /// check the return value: a refusal is load shedding, not an error.
    pub fn offer(&self, item: T) -> bool {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(item);
        drop(items);

        self.available.notify_one();
        true
    }

    /// Remove and return the front item, if any.
    pub fn poll(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait until an item may be available.
    ///
    /// Wakeups can be spurious when several consumers race for the same
    /// item; callers must re-`poll` after waking.
    pub async fn item_available(&self) {
        self.available.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_poll_fifo() {
        let queue = BoundedQueue::new(3);

        assert!(queue.offer("a"));
        assert!(queue.offer("b"));
        assert!(queue.offer("c"));
        assert!(!queue.offer("d"));

        assert_eq!(queue.poll(), Some("a"));
        assert!(queue.offer("d"));

        assert_eq!(queue.poll(), Some("b"));
        assert_eq!(queue.poll(), Some("c"));
        assert_eq!(queue.poll(), Some("d"));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let queue = BoundedQueue::new(4);

        for i in 0..100 {
            queue.offer(i);
            assert!(queue.len() <= queue.capacity());
        }
        assert!(queue.is_full());
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_offer_rejects_only_at_capacity() {
        let queue = BoundedQueue::new(2);

        assert!(!queue.is_full());
        assert!(queue.offer(1));
        assert!(queue.offer(2));
        assert!(queue.is_full());
        assert!(!queue.offer(3));

        queue.poll();
        assert!(queue.offer(3));
    }

    #[tokio::test]
    async fn test_item_available_wakes_consumer() {
        use std::sync::Arc;
        use std::time::Duration;

        let queue = Arc::new(BoundedQueue::new(2));

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                loop {
                    if let Some(item) = queue.poll() {
                        return item;
                    }
                    queue.item_available().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.offer(42));

        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer never woke")
            .unwrap();
        assert_eq!(received, 42);
    }
}
