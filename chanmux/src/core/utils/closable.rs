//! # Closable resources
//!
//! Resources like multiplexers or framed channels are shared between application threads, reader
//! and writer threads, and continuations. Their "closed" state is tracked by two entities:
//!
//! * [`Closer`] is owned by the resource itself. The resource is closed when [`Closer::close`] is
//!   called or when the closer goes out of scope. This struct is intentionally not [`Clone`].
//! * [`Closable`] is a read-only view of the same state handed out to dependent tasks, such as
//!   I/O handler threads, which have to stop once the owner is gone.
//!
//! Closing is idempotent: [`Closer::close`] reports whether the current call performed the
//! transition, so the owner can run its teardown exactly once.

use std::sync::atomic::AtomicBool;
use std::sync::{atomic, Arc};

/// State of a resource governed by its owner.
///
/// # Usage
///
/// ```rust
/// use chanmux::core::utils::Closer;
///
/// let closer = Closer::new();
/// let closable = closer.to_closable();
///
/// assert!(!closable.is_closed());
///
/// assert!(closer.close());
/// assert!(!closer.close());
///
/// assert!(closable.is_closed());
/// ```
#[derive(Debug)]
#[must_use]
pub struct Closer(Arc<AtomicBool>);

impl Closer {
    /// Creates an open closer.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Returns an instance of [`Closable`], a read-only accessor to the internal state.
    pub fn to_closable(&self) -> Closable {
        Closable(self.0.clone())
    }

    /// Closes the resource.
    ///
    /// Returns `true` only for the call that actually closed the resource.
    pub fn close(&self) -> bool {
        self.0
            .compare_exchange(
                false,
                true,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns `true` if resource is closed.
    pub fn is_closed(&self) -> bool {
        self.0.load(atomic::Ordering::Acquire)
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Closer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read-only access to a state of a resource.
///
/// [`Closable`] can be obtained by [`Closer::to_closable`].
#[derive(Clone, Debug)]
#[must_use]
pub struct Closable(Arc<AtomicBool>);

impl Closable {
    /// Returns `true` if resource is closed.
    pub fn is_closed(&self) -> bool {
        self.0.load(atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closer_state_is_passing() {
        let closer = Closer::new();
        assert!(!closer.is_closed());

        let closable_1 = closer.to_closable();
        let closable_2 = closable_1.clone();

        assert!(!closable_1.is_closed());
        assert!(!closable_2.is_closed());

        closer.close();

        assert!(closer.is_closed());
        assert!(closable_1.is_closed());
        assert!(closable_2.is_closed());
    }

    #[test]
    fn closer_drop_means_closed() {
        let closer = Closer::new();
        let closable = closer.to_closable();

        drop(closer);

        assert!(closable.is_closed());
    }

    #[test]
    fn only_first_close_reports_transition() {
        let closer = Arc::new(Closer::new());

        let handlers: Vec<_> = (0..8)
            .map(|_| {
                let closer = closer.clone();
                std::thread::spawn(move || closer.close())
            })
            .collect();

        let transitions = handlers
            .into_iter()
            .map(|handler| handler.join().unwrap())
            .filter(|closed| *closed)
            .count();

        assert_eq!(transitions, 1);
    }
}
