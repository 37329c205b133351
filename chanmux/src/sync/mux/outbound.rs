use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crate::core::{Delivery, Progress, SerialRunner, Signal};
use crate::sync::mux::multiplexer::Shared;

use crate::prelude::*;

/// Send credit of an outbound channel.
///
/// Window is debited only by the channel runner and credited only by peer window updates, both
/// with compare-and-swap so a debit never interleaves with a credit.
#[derive(Debug)]
pub(super) struct Credit {
    window: AtomicU32,
    max_window: u32,
    increased: Signal,
}

impl Credit {
    pub(super) fn new(max_window: u32) -> Self {
        Self {
            window: AtomicU32::new(max_window),
            max_window,
            increased: Signal::new(),
        }
    }

    /// Currently available window.
    pub(super) fn window(&self) -> u32 {
        self.window.load(Ordering::Acquire)
    }

    /// Debits `amount` if enough credit is available.
    pub(super) fn try_debit(&self, amount: u32) -> bool {
        self.window
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |window| {
                window.checked_sub(amount)
            })
            .is_ok()
    }

    /// Applies a peer window update and wakes a waiting sender.
    ///
    /// Returns the new window.
    pub(super) fn grant(&self, channel: usize, delta: i32) -> std::result::Result<u32, ProtocolError> {
        let max_window = self.max_window;
        let updated = self
            .window
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |window| {
                if delta <= 0 || window as u64 + delta as u64 > max_window as u64 {
                    return None;
                }
                Some(window + delta as u32)
            });

        match updated {
            Ok(window) => {
                self.increased.set();
                Ok(window + delta as u32)
            }
            Err(window) => Err(ProtocolError::IllegalWindowDelta {
                channel,
                delta,
                window,
                max_window,
            }),
        }
    }

    /// Signal which is set every time the window is increased.
    pub(super) fn increased(&self) -> &Signal {
        &self.increased
    }
}

/// Pending send of a single message.
#[derive(Clone, Debug)]
pub(super) struct SendItem {
    message: DataMessage,
    operation: Operation<()>,
    dispatched: Arc<AtomicBool>,
    sent: Signal,
}

impl SendItem {
    pub(super) fn new(message: DataMessage) -> Self {
        Self {
            message,
            operation: Operation::pending(),
            dispatched: Arc::new(AtomicBool::new(false)),
            sent: Signal::new(),
        }
    }

    pub(super) fn operation(&self) -> Operation<()> {
        self.operation.clone()
    }

    pub(super) fn fail(&self, err: Error) {
        let _ = self.operation.complete_error(err, false);
    }
}

/// Serialized send queue of an outbound channel.
pub(super) struct SendQueue {
    runner: SerialRunner<SendItem>,
    credit: Arc<Credit>,
}

impl SendQueue {
    pub(super) fn new(channel: usize, max_window: u32, shared: Weak<Shared>) -> Self {
        let credit = Arc::new(Credit::new(max_window));

        let runner = SerialRunner::new({
            let credit = credit.clone();
            move |item: &SendItem, is_retry| attempt(&shared, channel, &credit, item, is_retry)
        });

        Self { runner, credit }
    }

    pub(super) fn enqueue(&self, item: SendItem) -> Result<()> {
        self.runner.enqueue(item)
    }

    pub(super) fn credit(&self) -> &Credit {
        &self.credit
    }

    /// Closes the queue and fails every item which was not dispatched.
    pub(super) fn close(&self, err: Error) {
        self.credit.increased.clear();
        for item in self.runner.close() {
            item.fail(err.clone());
        }
    }
}

fn attempt(
    shared: &Weak<Shared>,
    channel: usize,
    credit: &Credit,
    item: &SendItem,
    is_retry: bool,
) -> Progress {
    if item.dispatched.load(Ordering::Acquire) {
        return Progress::Done;
    }

    let shared = match shared.upgrade() {
        Some(shared) => shared,
        None => {
            item.fail(Error::Disposed);
            return Progress::Done;
        }
    };
    if shared.is_closed() {
        item.fail(shared.closed_error());
        return Progress::Done;
    }

    let len = item.message.len() as u32;
    while !credit.try_debit(len) {
        if !credit.increased.try_consume() {
            log::trace!(
                "[{:?}] channel {channel}: waiting for credit, need {len}, window {}",
                shared.id(),
                credit.window()
            );
            return Progress::Wait(credit.increased.clone());
        }
    }

    item.dispatched.store(true, Ordering::Release);
    log::trace!(
        "[{:?}] channel {channel}: dispatching {len} bytes, window {}",
        shared.id(),
        credit.window()
    );

    let send = shared.physical().begin_send(item.message.clone());
    if let Some(result) = send.try_result() {
        let _ = item
            .operation
            .complete(result, !is_retry && send.completed_synchronously());
        return Progress::Done;
    }

    send.on_complete(Delivery::Inline, {
        let item = item.clone();
        move |send| {
            if let Some(result) = send.try_result() {
                let _ = item.operation.complete(result, false);
            }
            item.sent.set();
        }
    });

    Progress::Wait(item.sent.clone())
}
