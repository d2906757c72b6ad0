//! Audio engine capability set
//!
//! The playback layer never talks to audio hardware directly. Everything it
//! needs (driver negotiation, sound resources, playback channels, speaker
//! gains, spectrum data) goes through this trait, so the session and players
//! can run against the desktop `cpal` engine or an in-memory fake.

use crate::error::EngineResult;
use crate::routing::SpeakerMix;
use crate::types::{
    AdvancedSettings, ChannelGroupHandle, ChannelHandle, DriverInfo, FftWindow, LoopMode,
    OutputBackend, SoftwareFormat, SoundHandle, SpeakerMode, TimeUnit,
};
use std::path::Path;

/// Capabilities consumed from the underlying audio engine
///
/// All methods take `&self`: implementations synchronize internally and are
/// shared between the session, the players and their waiter threads.
#[cfg_attr(test, mockall::automock)]
pub trait AudioEngine: Send + Sync {
    /// Create the engine connection. This is the only step whose failure
    /// prevents the session from coming up.
    fn create(&self) -> EngineResult<()>;

    /// Tear down the connection, releasing every channel and engine-owned sound
    fn close(&self) -> EngineResult<()>;

    /// Enumerate output drivers of the current backend
    fn drivers(&self) -> EngineResult<Vec<DriverInfo>>;

    /// Select the driver used by [`start`](Self::start)
    fn select_driver(&self, index: usize) -> EngineResult<()>;

    /// Set the mixer speaker layout
    fn set_speaker_mode(&self, mode: SpeakerMode) -> EngineResult<()>;

    /// Switch the output transport
    fn set_output_backend(&self, backend: OutputBackend) -> EngineResult<()>;

    /// Force the software mixer format
    fn set_software_format(&self, format: SoftwareFormat) -> EngineResult<()>;

    /// Open the selected device and start mixing with up to `max_channels`
    /// simultaneous channels. Returns the master channel group.
    fn start(&self, max_channels: u32) -> EngineResult<ChannelGroupHandle>;

    /// Current advanced settings
    fn advanced_settings(&self) -> EngineResult<AdvancedSettings>;

    /// Apply advanced settings
    fn set_advanced_settings(&self, settings: &AdvancedSettings) -> EngineResult<()>;

    /// Create a sound from a file. Streaming sounds are owned by the engine.
    fn create_sound(&self, path: &Path, streaming: bool) -> EngineResult<SoundHandle>;

    /// Release a sound created with `streaming == false`
    fn release_sound(&self, sound: SoundHandle) -> EngineResult<()>;

    /// Length of a sound in PCM sample frames
    fn sound_length_samples(&self, sound: SoundHandle) -> EngineResult<u32>;

    /// Whether the sound has finished opening and can be played
    fn is_sound_ready(&self, sound: SoundHandle) -> EngineResult<bool>;

    /// Start a sound on a free channel
    fn play_sound(&self, sound: SoundHandle, paused: bool) -> EngineResult<ChannelHandle>;

    /// Stop a channel; its handle becomes stale
    fn stop_channel(&self, channel: ChannelHandle) -> EngineResult<()>;

    /// Whether the channel is still playing (paused channels count as playing)
    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool>;

    /// Playback frequency in Hz
    fn channel_frequency(&self, channel: ChannelHandle) -> EngineResult<f32>;

    /// Set playback frequency in Hz; negative plays backwards
    fn set_channel_frequency(&self, channel: ChannelHandle, frequency: f32) -> EngineResult<()>;

    /// Set channel volume
    fn set_channel_volume(&self, channel: ChannelHandle, volume: f32) -> EngineResult<()>;

    /// Set stereo pan in [-1, 1], resetting the speaker matrix to stereo placement
    fn set_channel_pan(&self, channel: ChannelHandle, pan: f32) -> EngineResult<()>;

    /// Pause or resume a channel
    fn set_channel_paused(&self, channel: ChannelHandle, paused: bool) -> EngineResult<()>;

    /// Set loop mode
    fn set_channel_loop(&self, channel: ChannelHandle, mode: LoopMode) -> EngineResult<()>;

    /// Seek a channel
    fn set_channel_position(
        &self,
        channel: ChannelHandle,
        position: u32,
        unit: TimeUnit,
    ) -> EngineResult<()>;

    /// Current channel position
    fn channel_position(&self, channel: ChannelHandle, unit: TimeUnit) -> EngineResult<u32>;

    /// Set the legacy 8-speaker mix
    fn set_channel_speaker_mix(&self, channel: ChannelHandle, mix: &SpeakerMix)
        -> EngineResult<()>;

    /// Set how much of each input channel reaches one output speaker
    fn set_channel_speaker_levels(
        &self,
        channel: ChannelHandle,
        speaker: usize,
        levels: &[f32],
    ) -> EngineResult<()>;

    /// Stop every channel in a group
    fn stop_group(&self, group: ChannelGroupHandle) -> EngineResult<()>;

    /// Set group volume
    fn set_group_volume(&self, group: ChannelGroupHandle, volume: f32) -> EngineResult<()>;

    /// Magnitudes of the current master mix, `bands` values in [0, 1]
    fn spectrum(&self, bands: usize, window: FftWindow) -> EngineResult<Vec<f32>>;

    /// Engine tick: reclaims finished channels and refreshes analysis data
    fn update(&self) -> EngineResult<()>;
}
