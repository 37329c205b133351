//! Multiplexer configuration.

use std::time::Duration;

use crate::consts::{DEFAULT_MAX_WINDOW, DEFAULT_WINDOW_UPDATE_TIMEOUT, MAX_CHANNELS};

use crate::prelude::*;

/// <sup>[`serde`](https://serde.rs)</sup>
/// Multiplexer configuration.
///
/// Configurations are dormant and can be cloned, so the same configuration can be used to create
/// both ends of a connection. Configuration is validated when a
/// [`Multiplexer`](super::Multiplexer) is created.
///
/// Both peers must agree on the number of channels: inbound channels of one side are outbound
/// channels of the other.
///
/// # Usage
///
/// ```rust
/// use std::time::Duration;
/// use chanmux::sync::mux::MuxConf;
///
/// let conf = MuxConf::builder()
///     .inbound_channels(4)
///     .outbound_channels(2)
///     .max_window(16 * 1024)
///     .window_update_timeout(Some(Duration::from_secs(1)))
///     .build();
///
/// assert_eq!(conf.inbound_channels(), 4);
/// assert_eq!(conf.outbound_channels(), 2);
/// assert!(conf.validate().is_ok());
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxConf {
    inbound_channels: usize,
    outbound_channels: usize,
    max_window: u32,
    window_update_timeout: Option<Duration>,
}

/// Builder for [`MuxConf`].
#[derive(Clone, Debug)]
pub struct MuxConfBuilder {
    conf: MuxConf,
}

impl Default for MuxConf {
    fn default() -> Self {
        Self {
            inbound_channels: 1,
            outbound_channels: 1,
            max_window: DEFAULT_MAX_WINDOW,
            window_update_timeout: DEFAULT_WINDOW_UPDATE_TIMEOUT,
        }
    }
}

impl MuxConf {
    /// Creates a [`MuxConfBuilder`] with default settings.
    pub fn builder() -> MuxConfBuilder {
        MuxConfBuilder {
            conf: MuxConf::default(),
        }
    }

    /// Number of channels this side receives on.
    pub fn inbound_channels(&self) -> usize {
        self.inbound_channels
    }

    /// Number of channels this side sends on.
    pub fn outbound_channels(&self) -> usize {
        self.outbound_channels
    }

    /// Maximum receive window of every channel in bytes.
    ///
    /// Default value is [`DEFAULT_MAX_WINDOW`].
    pub fn max_window(&self) -> u32 {
        self.max_window
    }

    /// Time given to a window update to be sent before the multiplexer is aborted.
    ///
    /// [`None`] means no timeout. Default value is [`DEFAULT_WINDOW_UPDATE_TIMEOUT`].
    pub fn window_update_timeout(&self) -> Option<Duration> {
        self.window_update_timeout
    }

    /// Creates a [`MuxConfBuilder`] initialised with current configuration.
    pub fn update(self) -> MuxConfBuilder {
        MuxConfBuilder { conf: self }
    }

    /// Validates configuration.
    ///
    /// Channel counts can't exceed [`MAX_CHANNELS`], maximum window must be positive and fit into
    /// `i32`.
    pub fn validate(&self) -> Result<()> {
        if self.inbound_channels > MAX_CHANNELS {
            return Err(Error::InvalidConf(format!(
                "too many inbound channels: {}, max {MAX_CHANNELS}",
                self.inbound_channels
            )));
        }
        if self.outbound_channels > MAX_CHANNELS {
            return Err(Error::InvalidConf(format!(
                "too many outbound channels: {}, max {MAX_CHANNELS}",
                self.outbound_channels
            )));
        }
        if self.max_window == 0 || self.max_window > i32::MAX as u32 {
            return Err(Error::InvalidConf(format!(
                "max window must be within 1..={}, got {}",
                i32::MAX,
                self.max_window
            )));
        }
        Ok(())
    }
}

impl MuxConfBuilder {
    /// Sets the number of inbound channels.
    pub fn inbound_channels(mut self, count: usize) -> Self {
        self.conf.inbound_channels = count;
        self
    }

    /// Sets the number of outbound channels.
    pub fn outbound_channels(mut self, count: usize) -> Self {
        self.conf.outbound_channels = count;
        self
    }

    /// Sets the maximum window per channel.
    pub fn max_window(mut self, max_window: u32) -> Self {
        self.conf.max_window = max_window;
        self
    }

    /// Sets window update timeout, [`None`] disables it.
    pub fn window_update_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.conf.window_update_timeout = timeout;
        self
    }

    /// Builds configuration.
    pub fn build(self) -> MuxConf {
        self.conf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_conf_is_valid() {
        let conf = MuxConf::default();

        assert!(conf.validate().is_ok());
        assert_eq!(conf.max_window(), DEFAULT_MAX_WINDOW);
        assert_eq!(conf.window_update_timeout(), DEFAULT_WINDOW_UPDATE_TIMEOUT);
    }

    #[test]
    fn update_keeps_settings() {
        let conf = MuxConf::builder().inbound_channels(3).max_window(10).build();
        let updated = conf.clone().update().outbound_channels(5).build();

        assert_eq!(updated.inbound_channels(), 3);
        assert_eq!(updated.outbound_channels(), 5);
        assert_eq!(updated.max_window(), 10);
    }

    #[test]
    fn invalid_conf_is_rejected() {
        let too_many = MuxConf::builder().inbound_channels(MAX_CHANNELS + 1).build();
        assert!(matches!(too_many.validate(), Err(Error::InvalidConf(_))));

        let too_many = MuxConf::builder().outbound_channels(MAX_CHANNELS + 1).build();
        assert!(matches!(too_many.validate(), Err(Error::InvalidConf(_))));

        let zero_window = MuxConf::builder().max_window(0).build();
        assert!(matches!(zero_window.validate(), Err(Error::InvalidConf(_))));

        let huge_window = MuxConf::builder().max_window(u32::MAX).build();
        assert!(matches!(huge_window.validate(), Err(Error::InvalidConf(_))));
    }
}
