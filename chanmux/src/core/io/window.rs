use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::consts::WINDOW_UPDATE_LENGTH;
use crate::errors::ProtocolError;

/// Flow control update.
///
/// Grants the receiver of this update `delta` more bytes of credit on its outbound `channel`.
/// Encoded as two big-endian `i32`: the target channel followed by the delta.
///
/// ```rust
/// use chanmux::core::io::WindowUpdate;
///
/// let update = WindowUpdate::new(1, 40);
/// let encoded = update.encode();
///
/// assert_eq!(encoded.as_ref(), &[0, 0, 0, 1, 0, 0, 0, 40]);
/// assert_eq!(WindowUpdate::decode(&encoded).unwrap(), update);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WindowUpdate {
    /// Target channel.
    pub channel: i32,
    /// Number of credited bytes.
    pub delta: i32,
}

impl WindowUpdate {
    /// Creates window update.
    pub fn new(channel: i32, delta: i32) -> Self {
        Self { channel, delta }
    }

    /// Encodes window update into its wire representation.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WINDOW_UPDATE_LENGTH);
        buf.put_i32(self.channel);
        buf.put_i32(self.delta);
        buf.freeze()
    }

    /// Decodes window update.
    ///
    /// Fails with [`ProtocolError::MalformedWindowUpdate`] unless `payload` is exactly
    /// [`WINDOW_UPDATE_LENGTH`] bytes long.
    pub fn decode(mut payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != WINDOW_UPDATE_LENGTH {
            return Err(ProtocolError::MalformedWindowUpdate(payload.len()));
        }
        let channel = payload.get_i32();
        let delta = payload.get_i32();
        Ok(Self { channel, delta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_are_big_endian() {
        let update = WindowUpdate::new(2, -1);
        assert_eq!(update.encode().as_ref(), &[0, 0, 0, 2, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            WindowUpdate::decode(&[0; 7]),
            Err(ProtocolError::MalformedWindowUpdate(7))
        );
        assert_eq!(
            WindowUpdate::decode(&[0; 9]),
            Err(ProtocolError::MalformedWindowUpdate(9))
        );
    }
}
