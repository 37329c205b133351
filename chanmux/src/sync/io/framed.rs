use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::consts::MAX_FRAME_PAYLOAD_LENGTH;
use crate::core::io::MessageChannel;
use crate::core::queue::HandoffQueue;
use crate::core::utils::{lock, Closable, Closer, UniqueId};
use crate::sync::io::{read_frame, write_frame};

use crate::prelude::*;

type Incoming = Result<Option<DataMessage>>;
type Outgoing = (DataMessage, Operation<()>);
type ShutdownHook = Box<dyn FnOnce() + Send + 'static>;

/// <sup>[`sync`](crate::sync)</sup>
/// Message channel over a byte stream.
///
/// Messages are encoded as frames (see [`FrameHeader`](super::FrameHeader)). Each framed channel
/// spawns two threads:
///
/// * a read handler which decodes incoming frames and hands them over to pending receive
///   operations;
/// * a write handler which encodes outgoing messages, flushes the writer, and only then completes
///   the corresponding send operation.
///
/// The end of the underlying stream at a frame boundary is reported as a [`None`] message. Read
/// failures are reported once and then repeated for every subsequent receive.
///
/// The read handler can be blocked by the underlying reader after the channel is closed. Channels
/// created with a shutdown hook (like the one created by [`FramedChannel::tcp`]) invoke it upon
/// close to unblock the reader.
pub struct FramedChannel {
    id: UniqueId,
    closer: Closer,
    inbound: HandoffQueue<Incoming>,
    outbound: HandoffQueue<Outgoing>,
    terminal: Arc<Mutex<Option<Incoming>>>,
    shutdown: Mutex<Option<ShutdownHook>>,
}

impl Debug for FramedChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("id", &self.id)
            .field("closed", &self.closer.is_closed())
            .finish_non_exhaustive()
    }
}

impl FramedChannel {
    /// Creates a framed channel over a reader and a writer.
    pub fn new<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::spawn(reader, writer, None)
    }

    /// Creates a framed channel with a hook which is invoked when channel is closed.
    pub fn with_shutdown<R, W, F>(reader: R, writer: W, shutdown: F) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(reader, writer, Some(Box::new(shutdown)))
    }

    /// Creates a framed channel over a TCP stream.
    ///
    /// The stream is shut down in both directions when channel is closed.
    pub fn tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;

        Self::with_shutdown(reader, writer, move || {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                log::debug!("TCP stream shutdown failed: {err:?}");
            }
        })
    }

    /// Channel identifier used in logs.
    pub fn id(&self) -> UniqueId {
        self.id
    }

    fn spawn<R, W>(reader: R, writer: W, shutdown: Option<ShutdownHook>) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let id = UniqueId::new();
        let closer = Closer::new();
        let inbound = HandoffQueue::new();
        let outbound = HandoffQueue::new();
        let terminal = Arc::new(Mutex::new(None));

        log::debug!("[{id:?}] spawning framed channel");

        thread::Builder::new()
            .name(format!("chanmux-framed-write-{id:?}"))
            .spawn({
                let outbound = outbound.clone();
                move || Self::write_handler(id, writer, outbound)
            })?;

        let spawned_reader = thread::Builder::new()
            .name(format!("chanmux-framed-read-{id:?}"))
            .spawn({
                let state = closer.to_closable();
                let inbound = inbound.clone();
                let terminal = terminal.clone();
                move || Self::read_handler(id, state, reader, inbound, terminal)
            });

        if let Err(err) = spawned_reader {
            outbound.close();
            return Err(err.into());
        }

        Ok(Self {
            id,
            closer,
            inbound,
            outbound,
            terminal,
            shutdown: Mutex::new(shutdown),
        })
    }

    fn write_handler<W: Write>(id: UniqueId, mut writer: W, outbound: HandoffQueue<Outgoing>) {
        while let Ok((message, operation)) = outbound.dequeue() {
            let result = write_frame(&mut writer, &message).and_then(|_| Ok(writer.flush()?));

            match result {
                Ok(_) => {
                    log::trace!(
                        "[{id:?}] sent frame: channel={}, len={}",
                        message.channel(),
                        message.len()
                    );
                    let _ = operation.complete_ok((), false);
                }
                Err(err) => {
                    log::debug!("[{id:?}] write handler failed: {err:?}");
                    let _ = operation.complete_error(err.clone(), false);
                    for (_, operation) in outbound.close() {
                        let _ = operation.complete_error(err.clone(), false);
                    }
                    return;
                }
            }
        }

        if let Err(err) = writer.flush() {
            log::trace!("[{id:?}] final flush failed: {err:?}");
        }
        log::trace!("[{id:?}] write handler stopped");
    }

    fn read_handler<R: Read>(
        id: UniqueId,
        state: Closable,
        mut reader: R,
        inbound: HandoffQueue<Incoming>,
        terminal: Arc<Mutex<Option<Incoming>>>,
    ) {
        loop {
            if state.is_closed() {
                log::trace!("[{id:?}] read handler stopped");
                return;
            }

            let incoming = match read_frame(&mut reader) {
                Ok(Some(message)) => {
                    log::trace!(
                        "[{id:?}] received frame: channel={}, len={}",
                        message.channel(),
                        message.len()
                    );
                    if inbound.enqueue(Ok(Some(message))).is_err() {
                        return;
                    }
                    continue;
                }
                Ok(None) => {
                    log::debug!("[{id:?}] end of stream");
                    Ok(None)
                }
                Err(err) => {
                    if state.is_closed() {
                        return;
                    }
                    log::debug!("[{id:?}] read handler failed: {err:?}");
                    Err(err)
                }
            };

            *lock(&terminal) = Some(incoming.clone());
            let _ = inbound.enqueue(incoming);
            return;
        }
    }
}

impl MessageChannel for FramedChannel {
    fn begin_send(&self, message: DataMessage) -> Operation<()> {
        if self.closer.is_closed() {
            return Operation::completed_error(Error::Closed);
        }
        if message.len() > MAX_FRAME_PAYLOAD_LENGTH {
            return Operation::completed_error(Error::PayloadTooLarge {
                len: message.len(),
                limit: MAX_FRAME_PAYLOAD_LENGTH,
            });
        }

        let operation = Operation::pending();
        if let Err(err) = self.outbound.enqueue((message, operation.clone())) {
            return Operation::completed_error(err);
        }
        operation
    }

    fn begin_receive(&self) -> Operation<Option<DataMessage>> {
        if self.inbound.is_empty() {
            if let Some(terminal) = lock(&self.terminal).clone() {
                return match terminal {
                    Ok(message) => Operation::completed_ok(message),
                    Err(err) => Operation::completed_error(err),
                };
            }
        }

        self.inbound
            .begin_dequeue()
            .map(|incoming| incoming.and_then(|incoming| incoming))
    }

    fn maximum_payload_length(&self) -> usize {
        MAX_FRAME_PAYLOAD_LENGTH
    }

    fn close(&self) {
        if !self.closer.close() {
            return;
        }
        log::debug!("[{:?}] closing framed channel", self.id);

        for (_, operation) in self.outbound.close() {
            let _ = operation.complete_error(Error::Closed, false);
        }
        self.inbound.close();

        if let Some(shutdown) = lock(&self.shutdown).take() {
            shutdown();
        }
    }

    fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl Drop for FramedChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::io::pipe;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn framed_channels_over_pipe() {
        let ((left_reader, left_writer), (right_reader, right_writer)) = pipe::duplex();
        let left = FramedChannel::new(left_reader, left_writer).unwrap();
        let right = FramedChannel::new(right_reader, right_writer).unwrap();

        let receive = right.begin_receive();
        left.send(DataMessage::new(7, &b"frame"[..])).unwrap();
        left.send(DataMessage::new(2, &b"next"[..])).unwrap();

        let message = receive.wait_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(message, DataMessage::new(7, &b"frame"[..]));
        let message = right.begin_receive().wait_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(message.channel(), 2);
    }

    #[test]
    fn end_of_stream_is_sticky() {
        let ((_, left_writer), (right_reader, right_writer)) = pipe::duplex();
        let right = FramedChannel::new(right_reader, right_writer).unwrap();

        drop(left_writer);

        assert!(right.begin_receive().wait_timeout(TIMEOUT).unwrap().is_none());
        assert!(right.begin_receive().wait_timeout(TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn closed_channel_rejects_operations() {
        let ((left_reader, left_writer), _right) = pipe::duplex();
        let left = FramedChannel::new(left_reader, left_writer).unwrap();

        let receive = left.begin_receive();
        left.close();
        left.close();

        assert!(left.is_closed());
        assert!(matches!(receive.wait_timeout(TIMEOUT), Err(Error::Closed)));
        assert!(matches!(
            left.begin_send(DataMessage::new(0, &b"x"[..])).wait(),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let ((left_reader, left_writer), _right) = pipe::duplex();
        let left = FramedChannel::new(left_reader, left_writer).unwrap();

        let payload = vec![0u8; MAX_FRAME_PAYLOAD_LENGTH + 1];
        let send = left.begin_send(DataMessage::new(0, payload));

        assert!(send.completed_synchronously());
        assert!(matches!(send.wait(), Err(Error::PayloadTooLarge { .. })));
    }
}
