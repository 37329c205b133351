use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::utils::lock;
use crate::core::Operation;

use crate::prelude::*;

/// Queue which hands values over to waiting consumers.
///
/// Producers never block: [`HandoffQueue::enqueue`] either completes the oldest pending dequeue
/// operation or buffers the value. Consumers receive an [`Operation`] that is already completed
/// when a value is buffered, and pending otherwise. Buffered values and waiting consumers are
/// never present at the same time.
///
/// Cloned queues share the same state.
pub struct HandoffQueue<T> {
    inner: Arc<Mutex<HandoffState<T>>>,
}

struct HandoffState<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Operation<T>>,
    closed: bool,
    timeout: Option<Duration>,
}

impl<T> Clone for HandoffQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for HandoffQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner);
        f.debug_struct("HandoffQueue")
            .field("items", &state.items.len())
            .field("waiters", &state.waiters.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> HandoffQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandoffState {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: false,
                timeout: None,
            })),
        }
    }

    /// Creates an empty queue which produces dequeue operations with the specified `timeout`.
    ///
    /// A value handed over to a consumer which has already stopped waiting is not returned to the
    /// queue.
    pub fn with_timeout(timeout: Duration) -> Self {
        let queue = Self::new();
        lock(&queue.inner).timeout = Some(timeout);
        queue
    }

    /// Adds a value to the queue.
    ///
    /// If a consumer is waiting, its operation is completed with `value` on the current thread.
    /// Fails with [`Error::Closed`] if queue is closed.
    pub fn enqueue(&self, value: T) -> Result<()> {
        let waiter = {
            let mut state = lock(&self.inner);
            if state.closed {
                return Err(Error::Closed);
            }
            match state.waiters.pop_front() {
                Some(waiter) => waiter,
                None => {
                    state.items.push_back(value);
                    return Ok(());
                }
            }
        };

        if let Err(err) = waiter.complete_ok(value, false) {
            log::warn!("dequeue operation has been completed outside of the queue: {err:?}");
        }
        Ok(())
    }

    /// Starts dequeue.
    ///
    /// Returned operation is completed synchronously if queue has a buffered value, and fails with
    /// [`Error::Closed`] if queue is closed.
    pub fn begin_dequeue(&self) -> Operation<T> {
        let mut state = lock(&self.inner);

        if let Some(value) = state.items.pop_front() {
            return Operation::completed_ok(value);
        }
        if state.closed {
            return Operation::completed_error(Error::Closed);
        }

        let operation = match state.timeout {
            Some(timeout) => Operation::with_timeout(timeout),
            None => Operation::pending(),
        };
        state.waiters.push_back(operation.clone());
        operation
    }

    /// Blocks until a value is available.
    pub fn dequeue(&self) -> Result<T> {
        self.begin_dequeue().wait()
    }

    /// Takes a buffered value without registering a consumer.
    pub fn try_dequeue(&self) -> Option<T> {
        lock(&self.inner).items.pop_front()
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        lock(&self.inner).items.len()
    }

    /// Returns `true` if there are no buffered values.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).items.is_empty()
    }

    /// Number of pending dequeue operations.
    pub fn waiting(&self) -> usize {
        lock(&self.inner).waiters.len()
    }

    /// Returns `true` if queue is closed.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Closes the queue.
    ///
    /// Pending and future dequeue operations fail with [`Error::Closed`]. Buffered values are
    /// returned to the caller. Subsequent calls return an empty vector.
    pub fn close(&self) -> Vec<T> {
        let (waiters, items) = {
            let mut state = lock(&self.inner);
            state.closed = true;
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.items),
            )
        };

        for waiter in waiters {
            let _ = waiter.complete_error(Error::Closed, false);
        }

        items.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn buffered_values_are_dequeued_synchronously() {
        let queue = HandoffQueue::new();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.len(), 2);

        let first = queue.begin_dequeue();
        assert!(first.completed_synchronously());
        assert_eq!(first.wait().unwrap(), 1);
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn values_are_handed_to_waiters_in_order() {
        let queue = HandoffQueue::new();

        let first = queue.begin_dequeue();
        let second = queue.begin_dequeue();
        assert!(!first.is_completed());
        assert_eq!(queue.waiting(), 2);

        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();

        assert_eq!(first.wait().unwrap(), "a");
        assert_eq!(second.wait().unwrap(), "b");
        assert!(!first.completed_synchronously());
        assert_eq!(queue.waiting(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn blocking_dequeue_from_another_thread() {
        let queue = HandoffQueue::new();

        let handler = thread::spawn({
            let queue = queue.clone();
            move || queue.dequeue()
        });

        thread::sleep(Duration::from_millis(10));
        queue.enqueue(10u64).unwrap();

        assert_eq!(handler.join().unwrap().unwrap(), 10);
    }

    #[test]
    fn close_fails_waiters_and_returns_items() {
        let queue = HandoffQueue::new();
        let waiter = queue.begin_dequeue();

        let items = queue.close();
        assert!(items.is_empty());
        assert!(matches!(waiter.wait(), Err(Error::Closed)));
        assert!(matches!(queue.enqueue(1), Err(Error::Closed)));
        assert!(matches!(queue.dequeue(), Err(Error::Closed)));

        let queue = HandoffQueue::new();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.close(), vec![1, 2]);
        assert!(queue.close().is_empty());
    }

    #[test]
    fn dequeue_times_out() {
        let queue = HandoffQueue::<u8>::with_timeout(Duration::from_millis(5));
        assert!(matches!(queue.dequeue(), Err(Error::Timeout)));
    }
}
