//! Handles and value types shared between the session, the players and engines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a sound resource created by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(u64);

impl SoundHandle {
    /// Wrap an engine-specific raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine-specific id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque handle to a playback channel
///
/// Channels belong to the engine. A handle becomes stale once the channel is
/// stopped, finishes and gets reclaimed, or the engine is closed; engines
/// report stale handles with [`EngineError::InvalidHandle`](crate::EngineError::InvalidHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u64);

impl ChannelHandle {
    /// Wrap an engine-specific raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine-specific id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque handle to a channel group (the master group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelGroupHandle(u64);

impl ChannelGroupHandle {
    /// Wrap an engine-specific raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine-specific id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Driver family requested by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverType {
    /// Consumer driver stack (WDM/WASAPI, CoreAudio, ALSA)
    #[default]
    Default,

    /// Professional multi-channel interfaces through ASIO
    Asio,
}

/// Output transport used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Platform default mixer
    Default,

    /// ASIO
    Asio,
}

impl OutputBackend {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Asio => "ASIO",
        }
    }
}

impl fmt::Display for OutputBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Speaker layout used by the engine mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerMode {
    /// Engine default layout for the device
    Default,

    /// Stereo
    Stereo,

    /// 7.1
    Surround71,

    /// Raw passthrough: output channel `i` is speaker `i`, no downmixing
    Raw,
}

/// An output driver as enumerated by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Position in the engine's driver list
    pub index: usize,

    /// Driver / device name
    pub name: String,
}

/// Software mixer format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareFormat {
    /// Sample rate (Hz)
    pub sample_rate: u32,

    /// Bits per sample
    pub bit_depth: u16,

    /// Number of input channels
    pub input_channels: u16,

    /// Number of output channels
    pub output_channels: u16,
}

impl SoftwareFormat {
    /// Fixed format forced when running on ASIO: 48 kHz, 16-bit, 16 in / 16 out
    pub const ASIO: Self = Self {
        sample_rate: 48_000,
        bit_depth: 16,
        input_channels: 16,
        output_channels: 16,
    };
}

impl Default for SoftwareFormat {
    fn default() -> Self {
        Self::ASIO
    }
}

/// Advanced engine settings negotiated after start on ASIO
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedSettings {
    /// Number of ASIO channels in use
    pub asio_channel_count: u32,

    /// Physical channel for each logical speaker (`speaker_list[i]` receives speaker `i`)
    pub asio_speaker_list: Vec<usize>,
}

impl AdvancedSettings {
    /// Identity speaker list of length `count`
    pub fn identity(count: u32) -> Self {
        Self {
            asio_channel_count: count,
            asio_speaker_list: (0..count as usize).collect(),
        }
    }
}

/// Unit for channel positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// PCM sample frames
    Pcm,

    /// Milliseconds
    Ms,
}

/// Channel loop mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopMode {
    /// Play once
    Off,

    /// Loop forever
    Normal,
}

impl From<bool> for LoopMode {
    fn from(looping: bool) -> Self {
        if looping {
            Self::Normal
        } else {
            Self::Off
        }
    }
}

/// Window applied before the spectrum transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FftWindow {
    /// No window
    Rectangular,

    /// Hann (raised cosine)
    Hann,
}
