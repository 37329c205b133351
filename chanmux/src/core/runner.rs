use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::queue::HandoffQueue;
use crate::core::utils::lock;
use crate::core::{Delivery, Signal};

use crate::prelude::*;

/// Outcome of a single attempt of a [`SerialRunner`].
#[derive(Clone, Debug)]
pub enum Progress {
    /// Item is processed, runner may proceed with the next one.
    Done,
    /// Item can't be processed yet. It is retried once the signal is set.
    Wait(Signal),
}

/// Attempt function of a [`SerialRunner`].
///
/// Receives an item and a flag which is `true` when the item is being retried after a
/// [`Progress::Wait`].
pub type Attempt<T> = Arc<dyn Fn(&T, bool) -> Progress + Send + Sync + 'static>;

/// Serialized task runner.
///
/// Items are attempted strictly one at a time in their enqueue order. An attempt that can't
/// proceed returns [`Progress::Wait`] with a [`Signal`]. The item is then parked and attempted
/// again (with `is_retry` set) once the signal is set. No thread is blocked or spinning while an
/// item is parked.
///
/// Once an attempt is [`Progress::Done`], the runner takes the next queued item right away. When
/// the queue is empty, it registers a single dequeue operation which resumes processing on the
/// thread of the next producer.
///
/// [`SerialRunner::close`] drops the attempt function and returns every item which was never
/// attempted together with the parked one. An attempt already running when the runner is closed
/// finishes with the function it has started with. If such attempt asks to wait, it is immediately
/// retried once so it can observe whatever state has caused the runner to close, and the item is
/// dropped afterward.
pub struct SerialRunner<T> {
    inner: Arc<RunnerInner<T>>,
}

struct RunnerInner<T> {
    attempt: Mutex<Option<Attempt<T>>>,
    queue: HandoffQueue<T>,
    parked: Mutex<Option<T>>,
    closed: AtomicBool,
}

impl<T> Debug for SerialRunner<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialRunner")
            .field("queue", &self.inner.queue)
            .field("parked", &lock(&self.inner.parked).is_some())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Clone + Send + 'static> SerialRunner<T> {
    /// Creates a runner with the specified attempt function.
    pub fn new<F>(attempt: F) -> Self
    where
        F: Fn(&T, bool) -> Progress + Send + Sync + 'static,
    {
        let attempt: Attempt<T> = Arc::new(attempt);
        let inner = Arc::new(RunnerInner {
            attempt: Mutex::new(Some(attempt.clone())),
            queue: HandoffQueue::new(),
            parked: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        Self::pump(&inner, attempt);

        Self { inner }
    }

    /// Schedules an item.
    ///
    /// If runner is idle, the item is attempted on the current thread. Fails with [`Error::Closed`]
    /// if runner is closed.
    pub fn enqueue(&self, item: T) -> Result<()> {
        self.inner.queue.enqueue(item)
    }

    /// Number of items waiting for their first attempt.
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    /// Returns `true` if an item is parked until its wait condition is signaled.
    pub fn is_parked(&self) -> bool {
        lock(&self.inner.parked).is_some()
    }

    /// Returns `true` if runner is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes the runner.
    ///
    /// Returns the parked item, if any, followed by queued items. Subsequent calls return an
    /// empty vector.
    pub fn close(&self) -> Vec<T> {
        self.inner.closed.store(true, Ordering::Release);
        lock(&self.inner.attempt).take();

        let mut items = Vec::new();
        if let Some(parked) = lock(&self.inner.parked).take() {
            items.push(parked);
        }
        items.extend(self.inner.queue.close());
        items
    }

    fn pump(inner: &Arc<RunnerInner<T>>, attempt: Attempt<T>) {
        loop {
            let dequeue = inner.queue.begin_dequeue();

            if !dequeue.is_completed() {
                let inner = inner.clone();
                dequeue.on_complete(Delivery::Inline, move |dequeue| {
                    if let Some(Ok(item)) = dequeue.try_result() {
                        if Self::run(&inner, &attempt, item, false) {
                            Self::pump(&inner, attempt);
                        }
                    }
                });
                return;
            }

            match dequeue.try_result() {
                Some(Ok(item)) => {
                    if !Self::run(inner, &attempt, item, false) {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn run(inner: &Arc<RunnerInner<T>>, attempt: &Attempt<T>, item: T, is_retry: bool) -> bool {
        match attempt(&item, is_retry) {
            Progress::Done => true,
            Progress::Wait(signal) => {
                Self::park(inner, attempt, item, signal);
                false
            }
        }
    }

    fn park(inner: &Arc<RunnerInner<T>>, attempt: &Attempt<T>, item: T, signal: Signal) {
        {
            let mut parked = lock(&inner.parked);
            if inner.closed.load(Ordering::Acquire) {
                drop(parked);
                log::debug!("runner is closed, final retry of a waiting item");
                let _ = attempt(&item, true);
                return;
            }
            *parked = Some(item);
        }

        let inner = inner.clone();
        signal.subscribe(move || Self::resume(&inner));
    }

    fn resume(inner: &Arc<RunnerInner<T>>) {
        let attempt = match lock(&inner.attempt).clone() {
            Some(attempt) => attempt,
            None => return,
        };
        let item = match lock(&inner.parked).take() {
            Some(item) => item,
            None => return,
        };

        if Self::run(inner, &attempt, item, true) {
            Self::pump(inner, attempt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn items_are_attempted_in_order() {
        let (tx, rx) = mpsc::channel();
        let runner = SerialRunner::new(move |item: &u32, is_retry| {
            tx.send((*item, is_retry)).unwrap();
            Progress::Done
        });

        for item in 0..5 {
            runner.enqueue(item).unwrap();
        }

        let attempted: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            attempted,
            vec![(0, false), (1, false), (2, false), (3, false), (4, false)]
        );
    }

    #[test]
    fn waiting_item_blocks_followers_until_signaled() {
        let gate = Signal::new();
        let open = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let runner = SerialRunner::new({
            let gate = gate.clone();
            let open = open.clone();
            move |item: &&str, is_retry| {
                if *item == "gated" && !open.load(Ordering::SeqCst) {
                    return Progress::Wait(gate.clone());
                }
                tx.send((*item, is_retry)).unwrap();
                Progress::Done
            }
        });

        runner.enqueue("gated").unwrap();
        runner.enqueue("next").unwrap();

        assert!(runner.is_parked());
        assert_eq!(runner.queued(), 1);
        assert!(rx.try_recv().is_err());

        open.store(true, Ordering::SeqCst);
        gate.set();

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("gated", true));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("next", false));
        assert!(!runner.is_parked());
    }

    #[test]
    fn only_one_attempt_at_a_time() {
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));

        let runner = Arc::new(SerialRunner::new({
            let in_flight = in_flight.clone();
            let overlaps = overlaps.clone();
            let attempts = attempts.clone();
            move |_: &u32, _| {
                if in_flight.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_micros(50));
                attempts.fetch_add(1, Ordering::SeqCst);
                in_flight.store(false, Ordering::SeqCst);
                Progress::Done
            }
        }));

        let producers: Vec<_> = (0..4)
            .map(|n| {
                let runner = runner.clone();
                thread::spawn(move || {
                    for item in 0..50 {
                        runner.enqueue(n * 100 + item).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        for _ in 0..500 {
            if attempts.load(Ordering::SeqCst) == 200 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 200);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_returns_parked_and_queued_items() {
        let runner = SerialRunner::new(|item: &u8, _| {
            if *item == 0 {
                Progress::Wait(Signal::new())
            } else {
                Progress::Done
            }
        });

        runner.enqueue(0).unwrap();
        runner.enqueue(1).unwrap();
        runner.enqueue(2).unwrap();

        assert_eq!(runner.close(), vec![0, 1, 2]);
        assert!(runner.is_closed());
        assert!(matches!(runner.enqueue(3), Err(Error::Closed)));
        assert!(runner.close().is_empty());
    }
}
