use crate::core::queue::MultiQueue;

use crate::prelude::*;

/// Outcome of a frame arrival on a data channel.
pub(super) enum Arrival {
    /// A reader was waiting and has to be completed with the message.
    HandOff(Operation<DataMessage>, DataMessage),
    /// Message was buffered, receive budget of the channel has been debited.
    Buffered {
        /// Remaining receive budget.
        budget: i64,
    },
}

/// Receive side state of a multiplexer, always accessed under a single lock.
///
/// Every inbound channel has a queue of buffered messages, a queue of waiting readers, and a local
/// receive budget. The budget starts at the maximum window, is debited when a message is buffered,
/// and restored when the message is taken by a reader.
pub(super) struct Inbound {
    messages: MultiQueue<DataMessage>,
    waiters: MultiQueue<Operation<DataMessage>>,
    budget: Vec<i64>,
}

impl Inbound {
    pub(super) fn new(channels: usize, max_window: u32) -> Self {
        Self {
            messages: MultiQueue::new(channels),
            waiters: MultiQueue::new(channels),
            budget: vec![max_window as i64; channels],
        }
    }

    /// Takes a buffered message and restores the receive budget.
    pub(super) fn take(&mut self, channel: usize) -> Result<Option<DataMessage>> {
        if self.messages.count(channel)? == 0 {
            return Ok(None);
        }
        let message = self.messages.dequeue(channel)?;
        self.budget[channel] += message.len() as i64;
        Ok(Some(message))
    }

    /// Registers a reader.
    pub(super) fn wait(&mut self, channel: usize) -> Result<Operation<DataMessage>> {
        let operation = Operation::pending();
        self.waiters.enqueue(channel, operation.clone())?;
        Ok(operation)
    }

    /// Delivers a message to the oldest waiting reader or buffers it.
    pub(super) fn deliver(&mut self, message: DataMessage) -> Result<Arrival> {
        let channel = message.channel();

        if self.waiters.count(channel)? > 0 {
            let waiter = self.waiters.dequeue(channel)?;
            return Ok(Arrival::HandOff(waiter, message));
        }

        let len = message.len() as i64;
        self.messages.enqueue(channel, message)?;
        self.budget[channel] -= len;

        Ok(Arrival::Buffered {
            budget: self.budget[channel],
        })
    }

    /// Remaining receive budget of a channel.
    pub(super) fn budget(&self, channel: usize) -> Result<i64> {
        self.budget.get(channel).copied().ok_or(Error::OutOfRange {
            index: channel,
            count: self.budget.len(),
        })
    }

    /// Number of buffered messages of a channel.
    pub(super) fn buffered(&self, channel: usize) -> Result<usize> {
        self.messages.count(channel)
    }

    /// Drops buffered messages and returns waiting readers in their arrival order.
    pub(super) fn drain(&mut self) -> Vec<Operation<DataMessage>> {
        self.messages.drain();
        self.waiters
            .drain()
            .into_iter()
            .map(|(_, waiter)| waiter)
            .collect()
    }
}
