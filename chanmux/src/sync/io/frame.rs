use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::consts::{FRAME_HEADER_LENGTH, MAX_FRAME_PAYLOAD_LENGTH};

use crate::prelude::*;

/// Type of data frames, the only frame type currently defined.
const DATA_FRAME: u8 = 0;

/// <sup>[`sync`](crate::sync)</sup>
/// Header of a frame.
///
/// | Bytes | Field                                           |
/// |-------|-------------------------------------------------|
/// | 0     | frame type, always `0`                          |
/// | 1     | flags, always `0`                               |
/// | 2..4  | total length (header + payload), big-endian     |
/// | 4..8  | channel id, big-endian `i32`                    |
///
/// The payload follows the header and is padded with zeros to a multiple of 4 bytes. Padding is
/// not counted in the total length.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame type.
    pub frame_type: u8,
    /// Frame flags.
    pub flags: u8,
    /// Total length of a frame without padding.
    pub length: u16,
    /// Channel id.
    pub channel: i32,
}

impl FrameHeader {
    /// Header of a data frame carrying `payload_len` bytes to `channel`.
    pub fn data(channel: usize, payload_len: usize) -> Result<Self> {
        if payload_len > MAX_FRAME_PAYLOAD_LENGTH {
            return Err(Error::PayloadTooLarge {
                len: payload_len,
                limit: MAX_FRAME_PAYLOAD_LENGTH,
            });
        }
        let channel = i32::try_from(channel).map_err(|_| Error::OutOfRange {
            index: channel,
            count: i32::MAX as usize,
        })?;

        Ok(Self {
            frame_type: DATA_FRAME,
            flags: 0,
            length: (FRAME_HEADER_LENGTH + payload_len) as u16,
            channel,
        })
    }

    /// Decodes and validates a header.
    pub fn decode(bytes: &[u8; FRAME_HEADER_LENGTH]) -> Result<Self> {
        let header = Self {
            frame_type: bytes[0],
            flags: bytes[1],
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
            channel: i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        };

        if header.frame_type != DATA_FRAME {
            return Err(ProtocolError::UnknownFrameType(header.frame_type).into());
        }
        if (header.length as usize) < FRAME_HEADER_LENGTH {
            return Err(ProtocolError::FrameTooShort(header.length as usize).into());
        }
        if header.channel < 0 {
            return Err(ProtocolError::UnknownChannel(header.channel).into());
        }

        Ok(header)
    }

    /// Payload length without padding.
    pub fn payload_len(&self) -> usize {
        self.length as usize - FRAME_HEADER_LENGTH
    }
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// <sup>[`sync`](crate::sync)</sup>
/// Writes a message as a single frame.
///
/// The frame is written with a single call to [`Write::write_all`]. The writer is not flushed.
pub fn write_frame<W: Write>(writer: &mut W, message: &DataMessage) -> Result<()> {
    let header = FrameHeader::data(message.channel(), message.len())?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LENGTH + padded(message.len()));
    buf.put_u8(header.frame_type);
    buf.put_u8(header.flags);
    buf.put_u16(header.length);
    buf.put_i32(header.channel);
    buf.put_slice(message.payload());
    buf.put_bytes(0, padded(message.len()) - message.len());

    writer.write_all(&buf)?;
    Ok(())
}

/// <sup>[`sync`](crate::sync)</sup>
/// Reads a single frame.
///
/// Returns [`None`] if the stream has ended exactly at a frame boundary. A stream that ends in the
/// middle of a frame is an [`ErrorKind::UnexpectedEof`] I/O error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<DataMessage>> {
    let mut header = [0u8; FRAME_HEADER_LENGTH];
    match read_full(reader, &mut header)? {
        0 => return Ok(None),
        FRAME_HEADER_LENGTH => {}
        _ => return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into()),
    }

    let header = FrameHeader::decode(&header)?;
    let payload_len = header.payload_len();

    let mut body = vec![0u8; padded(payload_len)];
    reader.read_exact(&mut body)?;
    body.truncate(payload_len);

    Ok(Some(DataMessage::new(header.channel as usize, body)))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
