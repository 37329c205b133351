use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::core::io::{MessageChannel, WindowUpdate};
use crate::core::utils::{lock, spawn_detached, Closer, UniqueId};
use crate::core::Delivery;
use crate::sync::io::FramedChannel;
use crate::sync::mux::inbound::{Arrival, Inbound};
use crate::sync::mux::outbound::{SendItem, SendQueue};
use crate::sync::mux::{ChannelView, MuxConf};

use crate::prelude::*;

/// <sup>[`sync`](crate::sync)</sup>
/// Multiplexes logical channels over a single physical [`MessageChannel`].
///
/// A multiplexer has a fixed number of inbound and outbound channels. Every outbound channel has a
/// send window: the number of bytes which can be sent before the peer acknowledges them. Messages
/// which don't fit into the window wait in a per-channel queue until the peer sends a window
/// update. Messages on the same channel are transmitted in order, one at a time. There are no
/// ordering guarantees across channels.
///
/// Inbound messages are handed directly to waiting readers and acknowledged right away. Otherwise
/// they are buffered, and acknowledged when a reader takes them.
///
/// Window updates are sent on a reserved channel: its id equals the number of outbound channels of
/// the sender, which is the number of inbound channels of the receiver.
///
/// Protocol violations, transport failures within the receive loop, and failed window updates
/// abort the multiplexer: the physical channel is closed and every pending operation fails with
/// [`Error::Aborted`]. Operations on an explicitly closed multiplexer fail with
/// [`Error::Disposed`]. Dropping a multiplexer closes it.
///
/// # Usage
///
/// ```rust
/// use chanmux::prelude::*;
///
/// let (left, right) = MemoryChannel::pair();
/// let conf = MuxConf::builder()
///     .inbound_channels(1)
///     .outbound_channels(1)
///     .max_window(64)
///     .build();
///
/// let alice = Multiplexer::new(left, conf.clone()).unwrap();
/// let bob = Multiplexer::new(right, conf).unwrap();
///
/// let receive = bob.begin_receive(0).unwrap();
/// alice.send(DataMessage::new(0, &b"hi"[..])).unwrap();
///
/// assert_eq!(receive.wait().unwrap().payload().as_ref(), b"hi");
/// ```
pub struct Multiplexer {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    id: UniqueId,
    this: Weak<Shared>,
    conf: MuxConf,
    closer: Closer,
    failure: Mutex<Option<Error>>,
    physical: Arc<dyn MessageChannel>,
    receiving: AtomicBool,
    inbound: Mutex<Inbound>,
    outbound: Vec<SendQueue>,
}

impl Debug for Multiplexer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("id", &self.shared.id)
            .field("conf", &self.shared.conf)
            .field("closed", &self.shared.is_closed())
            .finish_non_exhaustive()
    }
}

impl Multiplexer {
    /// Creates a multiplexer over a physical channel.
    ///
    /// Starts receiving right away.
    pub fn new<C: MessageChannel>(channel: C, conf: MuxConf) -> Result<Self> {
        Self::from_arc(Arc::new(channel), conf)
    }

    /// Creates a multiplexer over a shared physical channel.
    pub fn from_arc(channel: Arc<dyn MessageChannel>, conf: MuxConf) -> Result<Self> {
        conf.validate()?;

        let shared = Arc::new_cyclic(|this: &Weak<Shared>| Shared {
            id: UniqueId::new(),
            this: this.clone(),
            inbound: Mutex::new(Inbound::new(conf.inbound_channels(), conf.max_window())),
            outbound: (0..conf.outbound_channels())
                .map(|channel| SendQueue::new(channel, conf.max_window(), this.clone()))
                .collect(),
            conf,
            closer: Closer::new(),
            failure: Mutex::new(None),
            physical: channel,
            receiving: AtomicBool::new(false),
        });

        log::debug!(
            "[{:?}] multiplexer created: inbound={}, outbound={}, max_window={}",
            shared.id,
            shared.conf.inbound_channels(),
            shared.conf.outbound_channels(),
            shared.conf.max_window()
        );

        shared.start_receiving();

        Ok(Self { shared })
    }

    /// Creates a multiplexer over a byte stream split into a reader and a writer.
    ///
    /// Messages are framed by [`FramedChannel`].
    pub fn over_stream<R, W>(reader: R, writer: W, conf: MuxConf) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        conf.validate()?;
        Self::new(FramedChannel::new(reader, writer)?, conf)
    }

    /// Creates a multiplexer over a TCP stream.
    pub fn tcp(stream: TcpStream, conf: MuxConf) -> Result<Self> {
        conf.validate()?;
        Self::new(FramedChannel::tcp(stream)?, conf)
    }

    /// Multiplexer identifier used in logs.
    pub fn id(&self) -> UniqueId {
        self.shared.id
    }

    /// Configuration this multiplexer was created with.
    pub fn conf(&self) -> &MuxConf {
        &self.shared.conf
    }

    /// Number of inbound channels.
    pub fn inbound_channels(&self) -> usize {
        self.shared.conf.inbound_channels()
    }

    /// Number of outbound channels.
    pub fn outbound_channels(&self) -> usize {
        self.shared.conf.outbound_channels()
    }

    /// Maximum window of every channel.
    pub fn max_window(&self) -> u32 {
        self.shared.conf.max_window()
    }

    /// Bytes which can be sent on an outbound channel before the peer acknowledges them.
    pub fn send_window(&self, channel: usize) -> Result<u32> {
        self.shared.send_window(channel)
    }

    /// Local receive budget of an inbound channel.
    ///
    /// Budget is reduced by buffered messages and can be negative if the peer ignores its window.
    pub fn receive_budget(&self, channel: usize) -> Result<i64> {
        lock(&self.shared.inbound).budget(channel)
    }

    /// Starts the receive loop.
    ///
    /// Receiving starts when multiplexer is created, subsequent calls have no effect.
    pub fn start_receiving(&self) {
        self.shared.start_receiving()
    }

    /// Starts receiving a message on an inbound channel.
    ///
    /// Returned operation is completed synchronously if a message is already buffered.
    pub fn begin_receive(&self, channel: usize) -> Result<Operation<DataMessage>> {
        self.shared.begin_receive(channel)
    }

    /// Blocks until a message is received on an inbound channel.
    pub fn receive(&self, channel: usize) -> Result<DataMessage> {
        self.shared.begin_receive(channel)?.wait()
    }

    /// Starts sending a message on an outbound channel defined by [`DataMessage::channel`].
    ///
    /// Returned operation is completed once the message is handed over to the physical channel.
    pub fn begin_send(&self, message: DataMessage) -> Result<Operation<()>> {
        self.shared.begin_send(message)
    }

    /// Sends a message and blocks until it is handed over to the physical channel.
    pub fn send(&self, message: DataMessage) -> Result<()> {
        self.shared.begin_send(message)?.wait()
    }

    /// Returns a view of a channel which is both inbound and outbound.
    pub fn get_channel(&self, channel: usize) -> Result<ChannelView> {
        let count = self.inbound_channels().min(self.outbound_channels());
        if channel >= count {
            return Err(Error::OutOfRange {
                index: channel,
                count,
            });
        }
        Ok(ChannelView::new(self.shared.clone(), channel))
    }

    /// Closes the multiplexer and its physical channel.
    ///
    /// Pending and future operations fail with [`Error::Disposed`]. Closing is idempotent.
    pub fn close(&self) {
        self.shared.abort(Error::Disposed);
    }

    /// Returns `true` if multiplexer is closed or aborted.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    pub(crate) fn id(&self) -> UniqueId {
        self.id
    }

    pub(crate) fn conf(&self) -> &MuxConf {
        &self.conf
    }

    pub(crate) fn physical(&self) -> &Arc<dyn MessageChannel> {
        &self.physical
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Error for operations on a closed multiplexer.
    pub(crate) fn closed_error(&self) -> Error {
        lock(&self.failure).clone().unwrap_or(Error::Disposed)
    }

    pub(crate) fn send_window(&self, channel: usize) -> Result<u32> {
        self.outbound
            .get(channel)
            .map(|queue| queue.credit().window())
            .ok_or(Error::OutOfRange {
                index: channel,
                count: self.outbound.len(),
            })
    }

    /// Largest payload that can ever be dispatched on an outbound channel.
    pub(crate) fn max_send_payload(&self) -> usize {
        self.physical
            .maximum_payload_length()
            .min(self.conf.max_window() as usize)
    }

    pub(crate) fn begin_receive(&self, channel: usize) -> Result<Operation<DataMessage>> {
        if channel >= self.conf.inbound_channels() {
            return Err(Error::OutOfRange {
                index: channel,
                count: self.conf.inbound_channels(),
            });
        }
        self.start_receiving();

        let taken = {
            let mut inbound = lock(&self.inbound);
            if self.is_closed() {
                return Err(self.closed_error());
            }
            match inbound.take(channel)? {
                Some(message) => message,
                None => return inbound.wait(channel),
            }
        };

        log::trace!(
            "[{:?}] channel {channel}: buffered message of {} bytes taken",
            self.id,
            taken.len()
        );
        self.send_window_update(channel, taken.len());

        Ok(Operation::completed_ok(taken))
    }

    pub(crate) fn begin_send(&self, message: DataMessage) -> Result<Operation<()>> {
        let channel = message.channel();
        if channel >= self.outbound.len() {
            return Err(Error::OutOfRange {
                index: channel,
                count: self.outbound.len(),
            });
        }
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let limit = self.max_send_payload();
        if message.len() > limit {
            return Err(Error::PayloadTooLarge {
                len: message.len(),
                limit,
            });
        }
        self.start_receiving();

        let item = SendItem::new(message);
        let operation = item.operation();
        self.outbound[channel]
            .enqueue(item)
            .map_err(|_| self.closed_error())?;

        Ok(operation)
    }

    fn start_receiving(&self) {
        if self
            .receiving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::trace!("[{:?}] receive loop started", self.id);
            Self::receive_loop(self.this.clone());
        }
    }

    /// Keeps exactly one physical receive outstanding.
    ///
    /// Synchronously completed receives are handled in a loop, asynchronous ones resume the loop
    /// from their continuation.
    fn receive_loop(this: Weak<Shared>) {
        loop {
            let receive = match this.upgrade() {
                Some(shared) if !shared.is_closed() => shared.physical.begin_receive(),
                _ => return,
            };

            if !receive.is_completed() {
                let this = this.clone();
                receive.on_complete(Delivery::Inline, move |receive| {
                    if Self::handle_received(&this, receive) {
                        Self::receive_loop(this);
                    }
                });
                return;
            }

            if !Self::handle_received(&this, receive) {
                return;
            }
        }
    }

    fn handle_received(this: &Weak<Shared>, receive: Operation<Option<DataMessage>>) -> bool {
        let shared = match this.upgrade() {
            Some(shared) => shared,
            None => return false,
        };

        match receive.try_result() {
            Some(Ok(Some(message))) => match shared.on_frame(message) {
                Ok(_) => true,
                Err(err) => {
                    shared.abort(err);
                    false
                }
            },
            Some(Ok(None)) => {
                log::debug!("[{:?}] physical channel reached its end", shared.id);
                shared.abort(Error::EndOfStream);
                false
            }
            Some(Err(err)) => {
                if !shared.is_closed() {
                    shared.abort(err);
                }
                false
            }
            None => false,
        }
    }

    fn on_frame(&self, message: DataMessage) -> Result<()> {
        let channel = message.channel();
        let window_channel = self.conf.inbound_channels();

        if channel == window_channel {
            let update = WindowUpdate::decode(message.payload())?;
            return self.on_window_update(update);
        }
        if channel > window_channel {
            return Err(ProtocolError::UnknownChannel(channel as i32).into());
        }

        let arrival = lock(&self.inbound).deliver(message)?;
        match arrival {
            Arrival::HandOff(waiter, message) => {
                let len = message.len();
                log::trace!("[{:?}] channel {channel}: {len} bytes handed off", self.id);
                if waiter.complete_ok(message, false).is_err() {
                    log::warn!("[{:?}] channel {channel}: reader completed twice", self.id);
                }
                self.send_window_update(channel, len);
            }
            Arrival::Buffered { budget } => {
                log::trace!("[{:?}] channel {channel}: buffered, budget {budget}", self.id);
                if budget < 0 {
                    log::warn!(
                        "[{:?}] channel {channel}: peer exceeded receive window by {} bytes",
                        self.id,
                        -budget
                    );
                }
            }
        }

        Ok(())
    }

    fn on_window_update(&self, update: WindowUpdate) -> Result<()> {
        let channel = usize::try_from(update.channel)
            .ok()
            .filter(|channel| *channel < self.outbound.len())
            .ok_or(ProtocolError::UnknownWindowChannel(update.channel))?;

        let window = self.outbound[channel]
            .credit()
            .grant(channel, update.delta)?;

        log::trace!(
            "[{:?}] channel {channel}: window update +{}, window {window}",
            self.id,
            update.delta
        );
        Ok(())
    }

    /// Acknowledges `size` consumed bytes of an inbound channel to the peer.
    fn send_window_update(&self, channel: usize, size: usize) {
        if size == 0 {
            return;
        }

        let update = WindowUpdate::new(channel as i32, size as i32);
        let message = DataMessage::new(self.conf.outbound_channels(), update.encode());
        let send = self.physical.begin_send(message);

        if let Some(result) = send.try_result() {
            if let Err(err) = result {
                self.window_update_failed(err);
            }
            return;
        }

        let this = self.this.clone();
        match self.conf.window_update_timeout() {
            Some(timeout) => spawn_detached("chanmux-window-update", move || {
                Self::watch_window_update(this, send, timeout)
            }),
            None => send.on_complete(Delivery::Inline, move |send| {
                if let (Some(Err(err)), Some(shared)) = (send.try_result(), this.upgrade()) {
                    shared.window_update_failed(err);
                }
            }),
        }
    }

    fn watch_window_update(this: Weak<Shared>, send: Operation<()>, timeout: Duration) {
        if let Err(err) = send.wait_timeout(timeout) {
            if let Some(shared) = this.upgrade() {
                shared.window_update_failed(err);
            }
        }
    }

    fn window_update_failed(&self, err: Error) {
        if self.is_closed() {
            return;
        }
        log::error!("[{:?}] window update failed: {err}", self.id);
        self.abort(err);
    }

    /// Closes the multiplexer and fails all pending operations.
    ///
    /// [`Error::Disposed`] is used for an explicit close, any other cause is wrapped into
    /// [`Error::Aborted`].
    pub(crate) fn abort(&self, cause: Error) {
        let failure = match cause {
            Error::Disposed => Error::Disposed,
            cause => Error::Aborted(Arc::new(cause)),
        };

        {
            // Failure is published together with the closed flag
            let mut stored = lock(&self.failure);
            if !self.closer.close() {
                return;
            }
            *stored = Some(failure.clone());
        }

        match &failure {
            Error::Aborted(cause) => log::error!("[{:?}] aborting multiplexer: {cause}", self.id),
            _ => log::debug!("[{:?}] closing multiplexer", self.id),
        }

        self.physical.close();

        let waiters = lock(&self.inbound).drain();
        for waiter in waiters {
            let _ = waiter.complete_error(failure.clone(), false);
        }
        for queue in &self.outbound {
            queue.close(failure.clone());
        }
    }
}
