//! Session configuration

use crate::error::ConfigError;
use crate::types::{DriverType, SoftwareFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest ASIO channel count the session will negotiate
pub const MAX_ASIO_CHANNELS: u32 = 32;

/// Engine session configuration
///
/// Every field has a default, so an empty file or no file at all yields a
/// session on the system default driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Output driver name to select; unknown names fall back to driver 0
    #[serde(default)]
    pub device_name: String,

    /// Driver family
    #[serde(default)]
    pub driver: DriverType,

    /// Number of ASIO channels (and speaker list length) negotiated after start
    #[serde(default = "default_asio_channel_count")]
    pub asio_channel_count: u32,

    /// Maximum number of simultaneous playback channels
    #[serde(default = "default_max_channels")]
    pub max_channels: u32,

    /// Software format forced in ASIO mode
    #[serde(default)]
    pub software_format: SoftwareFormat,

    /// How often a deferred `play_to` checks sound readiness
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// How long a deferred `play_to` waits before giving up
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            driver: DriverType::Default,
            asio_channel_count: default_asio_channel_count(),
            max_channels: default_max_channels(),
            software_format: SoftwareFormat::default(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl SessionConfig {
    /// Config for a named device on a driver family
    pub fn new(device_name: impl Into<String>, driver: DriverType) -> Self {
        Self {
            device_name: device_name.into(),
            driver,
            ..Default::default()
        }
    }

    /// Set the ASIO channel count
    pub fn with_asio_channel_count(mut self, count: u32) -> Self {
        self.asio_channel_count = count;
        self
    }

    /// Set the maximum number of simultaneous channels
    pub fn with_max_channels(mut self, max_channels: u32) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Set readiness polling for deferred playback
    pub fn with_ready_wait(mut self, poll_interval_ms: u64, timeout_ms: u64) -> Self {
        self.ready_poll_interval_ms = poll_interval_ms;
        self.ready_timeout_ms = timeout_ms;
        self
    }

    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables use the `MULTISPEAKER_` prefix and `__` between
    /// nested keys, e.g. `MULTISPEAKER_DRIVER=asio` or
    /// `MULTISPEAKER_SOFTWARE_FORMAT__SAMPLE_RATE=44100`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("MULTISPEAKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: Self = settings.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asio_channel_count == 0 || self.asio_channel_count > MAX_ASIO_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "asio_channel_count must be between 1 and {}, got {}",
                MAX_ASIO_CHANNELS, self.asio_channel_count
            )));
        }

        if self.max_channels == 0 {
            return Err(ConfigError::Invalid(
                "max_channels must be greater than 0".to_string(),
            ));
        }

        let format = &self.software_format;
        if format.sample_rate == 0
            || format.bit_depth == 0
            || format.input_channels == 0
            || format.output_channels == 0
        {
            return Err(ConfigError::Invalid(format!(
                "software_format fields must be non-zero: {:?}",
                format
            )));
        }

        if self.ready_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "ready_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Readiness polling interval
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    /// Readiness timeout
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

// Default values
fn default_asio_channel_count() -> u32 {
    16
}

fn default_max_channels() -> u32 {
    32
}

fn default_ready_poll_interval_ms() -> u64 {
    10
}

fn default_ready_timeout_ms() -> u64 {
    5_000
}
