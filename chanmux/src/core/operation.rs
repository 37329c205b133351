use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::core::utils::{lock, spawn_detached};

use crate::prelude::*;

/// Continuation invoked exactly once when an [`Operation`] completes.
///
/// Continuation receives a handle to the completed operation.
pub type Continuation<T> = Box<dyn FnOnce(Operation<T>) + Send + 'static>;

/// Defines on which thread a continuation is invoked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Invoke continuation on the thread which completes the operation (or registers a
    /// continuation on an already completed one).
    #[default]
    Inline,
    /// Invoke continuation on a separate thread.
    Detached,
}

/// Single-assignment completion handle.
///
/// An operation starts as pending and is completed exactly once, either with a value or with an
/// [`Error`]. A second completion attempt fails with [`Error::AlreadyCompleted`] and leaves the
/// first result intact.
///
/// Completion can be observed in two ways:
///
/// * by blocking in [`Operation::wait`] or [`Operation::wait_timeout`];
/// * by registering a continuation with [`Operation::on_complete`].
///
/// [`Operation`] is a cheap handle and can be cloned freely. All clones refer to the same result.
///
/// # Usage
///
/// ```rust
/// use std::thread;
/// use chanmux::core::Operation;
///
/// let operation = Operation::<u32>::pending();
///
/// thread::spawn({
///     let operation = operation.clone();
///     move || operation.complete_ok(42, false).unwrap()
/// });
///
/// assert_eq!(operation.wait().unwrap(), 42);
/// assert!(!operation.completed_synchronously());
/// ```
pub struct Operation<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    completed: Condvar,
    timeout: Option<Duration>,
}

enum State<T> {
    Pending {
        continuations: Vec<(Delivery, Continuation<T>)>,
    },
    Completed {
        result: Result<T>,
        synchronous: bool,
    },
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for Operation<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match &*lock(&self.inner.state) {
            State::Pending { .. } => "pending",
            State::Completed { result: Ok(_), .. } => "ok",
            State::Completed { result: Err(_), .. } => "error",
        };
        f.debug_struct("Operation")
            .field("state", &state)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Default for Operation<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T: Clone + Send + 'static> Operation<T> {
    /// Creates a pending operation without a timeout.
    pub fn pending() -> Self {
        Self::new(None, State::Pending {
            continuations: Vec::new(),
        })
    }

    /// Creates a pending operation.
    ///
    /// [`Operation::wait`] will fail with [`Error::Timeout`] once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(timeout), State::Pending {
            continuations: Vec::new(),
        })
    }

    /// Creates an operation which is already completed synchronously with `value`.
    pub fn completed_ok(value: T) -> Self {
        Self::new(None, State::Completed {
            result: Ok(value),
            synchronous: true,
        })
    }

    /// Creates an operation which is already completed synchronously with `err`.
    pub fn completed_error(err: Error) -> Self {
        Self::new(None, State::Completed {
            result: Err(err),
            synchronous: true,
        })
    }

    /// Creates a pending operation with a registered continuation.
    pub fn start<F>(delivery: Delivery, continuation: F) -> Self
    where
        F: FnOnce(Operation<T>) + Send + 'static,
    {
        Self::new(None, State::Pending {
            continuations: vec![(delivery, Box::new(continuation))],
        })
    }

    fn new(timeout: Option<Duration>, state: State<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                completed: Condvar::new(),
                timeout,
            }),
        }
    }

    /// Completes operation with `value`.
    ///
    /// `synchronous` should be `true` when the result was obtained on the thread which started the
    /// operation. Fails with [`Error::AlreadyCompleted`] if operation has been already completed.
    pub fn complete_ok(&self, value: T, synchronous: bool) -> Result<()> {
        self.complete(Ok(value), synchronous)
    }

    /// Completes operation with `err`.
    ///
    /// Fails with [`Error::AlreadyCompleted`] if operation has been already completed.
    pub fn complete_error(&self, err: Error, synchronous: bool) -> Result<()> {
        self.complete(Err(err), synchronous)
    }

    /// Completes operation with `result`.
    pub fn complete(&self, result: Result<T>, synchronous: bool) -> Result<()> {
        let continuations = {
            let mut state = lock(&self.inner.state);
            match &mut *state {
                State::Completed { .. } => return Err(Error::AlreadyCompleted),
                State::Pending { continuations } => {
                    let continuations = std::mem::take(continuations);
                    *state = State::Completed {
                        result,
                        synchronous,
                    };
                    continuations
                }
            }
        };
        self.inner.completed.notify_all();

        for (delivery, continuation) in continuations {
            self.invoke(delivery, continuation);
        }

        Ok(())
    }

    /// Registers a continuation.
    ///
    /// If operation is already completed, continuation is invoked right away according to
    /// `delivery`. Panics within continuations are caught and logged.
    pub fn on_complete<F>(&self, delivery: Delivery, continuation: F)
    where
        F: FnOnce(Operation<T>) + Send + 'static,
    {
        {
            let mut state = lock(&self.inner.state);
            if let State::Pending { continuations } = &mut *state {
                continuations.push((delivery, Box::new(continuation)));
                return;
            }
        }
        self.invoke(delivery, Box::new(continuation));
    }

    /// Blocks until operation is completed and returns its result.
    ///
    /// If operation was created with a timeout, fails with [`Error::Timeout`] once it has elapsed.
    pub fn wait(&self) -> Result<T> {
        match self.inner.timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => {
                let mut state = lock(&self.inner.state);
                loop {
                    if let State::Completed { result, .. } = &*state {
                        return result.clone();
                    }
                    state = self
                        .inner
                        .completed
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
    }

    /// Blocks until operation is completed or `timeout` has elapsed.
    ///
    /// Timing out does not complete the operation.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.inner.state);
        loop {
            if let State::Completed { result, .. } = &*state {
                return result.clone();
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            state = self
                .inner
                .completed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Creates an operation that is completed with the result of this one transformed by `f`.
    ///
    /// The new operation inherits the "completed synchronously" flag.
    pub fn map<U, F>(&self, f: F) -> Operation<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let completed = match &*lock(&self.inner.state) {
            State::Completed {
                result,
                synchronous,
            } => Some((result.clone(), *synchronous)),
            State::Pending { .. } => None,
        };

        if let Some((result, synchronous)) = completed {
            return Operation::new(None, State::Completed {
                result: f(result),
                synchronous,
            });
        }

        let mapped = Operation::<U>::pending();
        self.on_complete(Delivery::Inline, {
            let mapped = mapped.clone();
            move |source| {
                if let Some(result) = source.try_result() {
                    let synchronous = source.completed_synchronously();
                    let _ = mapped.complete(f(result), synchronous);
                }
            }
        });
        mapped
    }

    /// Returns result if operation is completed.
    pub fn try_result(&self) -> Option<Result<T>> {
        match &*lock(&self.inner.state) {
            State::Pending { .. } => None,
            State::Completed { result, .. } => Some(result.clone()),
        }
    }

    /// Returns `true` if operation is completed.
    pub fn is_completed(&self) -> bool {
        matches!(&*lock(&self.inner.state), State::Completed { .. })
    }

    /// Returns `true` if operation was completed on the thread which started it.
    pub fn completed_synchronously(&self) -> bool {
        matches!(
            &*lock(&self.inner.state),
            State::Completed {
                synchronous: true,
                ..
            }
        )
    }

    /// Timeout used by [`Operation::wait`].
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Returns `true` if both handles refer to the same operation.
    pub fn ptr_eq(&self, other: &Operation<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn invoke(&self, delivery: Delivery, continuation: Continuation<T>) {
        let operation = self.clone();
        match delivery {
            Delivery::Inline => run_guarded(continuation, operation),
            Delivery::Detached => spawn_detached("chanmux-continuation", move || {
                run_guarded(continuation, operation)
            }),
        }
    }
}

fn run_guarded<T>(continuation: Continuation<T>, operation: Operation<T>) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(move || continuation(operation))) {
        log::error!("continuation panicked: {}", panic_message(&panic));
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    use crate::test_utils::init_logger;

    #[test]
    fn operation_is_completed_once() {
        let operation = Operation::<u8>::pending();
        assert!(!operation.is_completed());

        operation.complete_ok(1, true).unwrap();
        assert!(matches!(
            operation.complete_ok(2, true),
            Err(Error::AlreadyCompleted)
        ));
        assert!(matches!(
            operation.complete_error(Error::Closed, false),
            Err(Error::AlreadyCompleted)
        ));

        assert!(operation.is_completed());
        assert!(operation.completed_synchronously());
        assert_eq!(operation.wait().unwrap(), 1);
    }

    #[test]
    fn concurrent_completions_have_one_winner() {
        const N_ROUNDS: usize = 100;
        const N_THREADS: usize = 8;

        for _ in 0..N_ROUNDS {
            let operation = Operation::<usize>::pending();
            let invoked = Arc::new(AtomicUsize::new(0));
            operation.on_complete(Delivery::Inline, {
                let invoked = invoked.clone();
                move |_| {
                    invoked.fetch_add(1, Ordering::SeqCst);
                }
            });

            let barrier = Arc::new(std::sync::Barrier::new(N_THREADS));
            let handles: Vec<_> = (0..N_THREADS)
                .map(|n| {
                    let operation = operation.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        operation.complete_ok(n, false).is_ok().then_some(n)
                    })
                })
                .collect();

            let winners: Vec<usize> = handles
                .into_iter()
                .filter_map(|handle| handle.join().unwrap())
                .collect();

            assert_eq!(winners.len(), 1);
            assert_eq!(operation.wait().unwrap(), winners[0]);
            assert_eq!(invoked.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn errors_are_captured() {
        let operation = Operation::<u8>::pending();
        operation.complete_error(Error::EndOfStream, false).unwrap();

        assert!(matches!(operation.wait(), Err(Error::EndOfStream)));
        assert!(matches!(operation.try_result(), Some(Err(Error::EndOfStream))));
        assert!(!operation.completed_synchronously());
    }

    #[test]
    fn wait_across_threads() {
        let operation = Operation::<String>::pending();

        let handler = thread::spawn({
            let operation = operation.clone();
            move || operation.wait()
        });

        thread::sleep(Duration::from_millis(10));
        operation.complete_ok("done".to_string(), false).unwrap();

        assert_eq!(handler.join().unwrap().unwrap(), "done");
    }

    #[test]
    fn wait_timeout_does_not_complete() {
        let operation = Operation::<u8>::pending();

        assert!(matches!(
            operation.wait_timeout(Duration::from_millis(5)),
            Err(Error::Timeout)
        ));
        assert!(!operation.is_completed());

        let operation = Operation::<u8>::with_timeout(Duration::from_millis(5));
        assert!(matches!(operation.wait(), Err(Error::Timeout)));
        operation.complete_ok(3, false).unwrap();
        assert_eq!(operation.wait().unwrap(), 3);
    }

    #[test]
    fn continuation_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let operation = Operation::<u8>::start(Delivery::Inline, {
            let calls = calls.clone();
            move |op| {
                assert_eq!(op.try_result().unwrap().unwrap(), 7);
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        operation.complete_ok(7, false).unwrap();
        operation.complete_ok(8, false).unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_continuation_runs_immediately() {
        let operation = Operation::completed_ok(5u8);
        let (tx, rx) = mpsc::channel();

        operation.on_complete(Delivery::Inline, move |op| {
            tx.send(op.wait().unwrap()).unwrap();
        });

        assert_eq!(rx.try_recv().unwrap(), 5);
    }

    #[test]
    fn detached_continuation_runs_on_another_thread() {
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();
        let operation = Operation::<u8>::pending();

        operation.on_complete(Delivery::Detached, move |_| {
            tx.send(thread::current().id()).unwrap();
        });
        operation.complete_ok(0, true).unwrap();

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn mapped_operation_follows_source() {
        let source = Operation::<u8>::pending();
        let mapped = source.map(|result| result.map(|value| value.to_string()));
        assert!(!mapped.is_completed());

        source.complete_ok(12, false).unwrap();
        assert_eq!(mapped.wait().unwrap(), "12");
        assert!(!mapped.completed_synchronously());

        let failed = Operation::<u8>::completed_error(Error::Closed).map(|result| result);
        assert!(failed.completed_synchronously());
        assert!(matches!(failed.wait(), Err(Error::Closed)));
    }

    #[test]
    fn continuation_panic_is_swallowed() {
        init_logger();

        let operation = Operation::<u8>::pending();
        let (tx, rx) = mpsc::channel();

        operation.on_complete(Delivery::Inline, |_| panic!("boom"));
        operation.on_complete(Delivery::Inline, move |_| tx.send(()).unwrap());

        operation.complete_ok(1, false).unwrap();

        rx.try_recv().unwrap();
        assert_eq!(operation.wait().unwrap(), 1);
    }
}
