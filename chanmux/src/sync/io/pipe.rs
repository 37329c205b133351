//! <sup>[`sync`](crate::sync)</sup>
//! In-memory byte streams.
//!
//! Pipes connect a [`FramedChannel`](super::FramedChannel) to its peer within the same process,
//! without sockets. Dropping a [`PipeWriter`] is observed by the peer [`PipeReader`] as the end of
//! stream.

use std::cmp::min;
use std::io::{Read, Write};
use std::sync::mpsc;

/// <sup>[`sync`](crate::sync)</sup>
/// Reading end of a pipe.
///
/// Returns `Ok(0)` once all peer writers are dropped and buffered bytes are consumed.
#[derive(Debug)]
pub struct PipeReader {
    receiver: mpsc::Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

/// <sup>[`sync`](crate::sync)</sup>
/// Writing end of a pipe.
///
/// Fails with [`ErrorKind::BrokenPipe`](std::io::ErrorKind::BrokenPipe) when the reader is dropped.
#[derive(Clone, Debug)]
pub struct PipeWriter {
    sender: mpsc::Sender<Vec<u8>>,
}

/// One end of a duplex pipe.
pub type PipeEnd = (PipeReader, PipeWriter);

/// Creates a unidirectional pipe.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = mpsc::channel();
    (
        PipeWriter { sender },
        PipeReader {
            receiver,
            buf: Vec::new(),
        },
    )
}

/// Creates two connected ends of a duplex pipe.
///
/// Bytes written to one end are read from the other.
///
/// ```rust
/// use std::io::{Read, Write};
/// use chanmux::sync::io::pipe;
///
/// let ((_, mut left_writer), (mut right_reader, _)) = pipe::duplex();
///
/// left_writer.write_all(b"ping").unwrap();
/// drop(left_writer);
///
/// let mut buf = Vec::new();
/// right_reader.read_to_end(&mut buf).unwrap();
/// assert_eq!(buf, b"ping");
/// ```
pub fn duplex() -> (PipeEnd, PipeEnd) {
    let (left_writer, right_reader) = pipe();
    let (right_writer, left_reader) = pipe();
    ((left_reader, left_writer), (right_reader, right_writer))
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.buf.is_empty() {
            match self.receiver.recv() {
                Ok(mut recv_buf) => self.buf.append(&mut recv_buf),
                Err(_) => return Ok(0),
            }
        }

        let bytes_read = min(self.buf.len(), buf.len());
        buf[0..bytes_read].copy_from_slice(&self.buf[0..bytes_read]);
        self.buf.drain(0..bytes_read);

        Ok(bytes_read)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender.send(buf.to_vec()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "PipeWriter: reader dropped")
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_reads_keep_remainder() {
        let (mut writer, mut reader) = pipe();
        writer.write_all(&[1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [3, 4, 5]);
    }

    #[test]
    fn dropped_reader_breaks_pipe() {
        let (mut writer, reader) = pipe();
        drop(reader);

        let err = writer.write(&[1]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
