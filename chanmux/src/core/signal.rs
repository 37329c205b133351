use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use crate::core::utils::{lock, spawn_detached};

type Waker = Box<dyn FnOnce() + Send + 'static>;

/// Auto-reset event.
///
/// [`Signal::set`] either wakes exactly one subscribed waker or, if nobody is subscribed, keeps
/// the signal latched until it is consumed by [`Signal::try_consume`] or by the next
/// [`Signal::subscribe`]. Wakers are always invoked on a separate thread, so the setter never runs
/// foreign code.
///
/// Signals are used as wait conditions of a [`SerialRunner`](super::SerialRunner): an attempt that
/// can't proceed returns a signal, and the runner subscribes to it instead of blocking a thread.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<Mutex<SignalState>>,
}

#[derive(Default)]
struct SignalState {
    set: bool,
    wakers: Vec<Waker>,
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner);
        f.debug_struct("Signal")
            .field("set", &state.set)
            .field("wakers", &state.wakers.len())
            .finish()
    }
}

impl Signal {
    /// Creates a signal in non-signaled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal.
    pub fn set(&self) {
        let waker = {
            let mut state = lock(&self.inner);
            if state.wakers.is_empty() {
                state.set = true;
                None
            } else {
                Some(state.wakers.remove(0))
            }
        };

        if let Some(waker) = waker {
            spawn_detached("chanmux-signal", waker);
        }
    }

    /// Consumes the signal if it is set.
    ///
    /// Returns `true` if signal was set.
    pub fn try_consume(&self) -> bool {
        let mut state = lock(&self.inner);
        std::mem::replace(&mut state.set, false)
    }

    /// Subscribes a waker which is invoked once the signal is set.
    ///
    /// If signal is already set, it is consumed and `waker` is invoked immediately.
    pub fn subscribe<F>(&self, waker: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.inner);
        if std::mem::replace(&mut state.set, false) {
            drop(state);
            spawn_detached("chanmux-signal", waker);
        } else {
            state.wakers.push(Box::new(waker));
        }
    }

    /// Drops all subscribed wakers without invoking them.
    pub fn clear(&self) {
        let wakers = {
            let mut state = lock(&self.inner);
            state.set = false;
            std::mem::take(&mut state.wakers)
        };
        drop(wakers);
    }
}
