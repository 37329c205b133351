//! Common constants.

use std::time::Duration;

/// Length of a frame header produced by [`FramedChannel`](crate::sync::io::FramedChannel).
pub const FRAME_HEADER_LENGTH: usize = 8;

/// Maximum payload that fits into a single frame.
pub const MAX_FRAME_PAYLOAD_LENGTH: usize = u16::MAX as usize - FRAME_HEADER_LENGTH;

/// Length of a window update payload.
pub const WINDOW_UPDATE_LENGTH: usize = 8;

/// Maximum number of inbound or outbound channels of a multiplexer.
pub const MAX_CHANNELS: usize = u16::MAX as usize;

/// Default maximum receive window per channel.
pub const DEFAULT_MAX_WINDOW: u32 = 64 * 1024;

/// Default timeout for window update round trips.
///
/// Disabled in debug builds.
pub const DEFAULT_WINDOW_UPDATE_TIMEOUT: Option<Duration> = if cfg!(debug_assertions) {
    None
} else {
    Some(Duration::from_millis(2000))
};
