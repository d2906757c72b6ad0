//! In-memory engine for tests
//!
//! [`FakeEngine`] implements [`AudioEngine`] without touching hardware. It
//! records every parameter written to its channels and counts sound
//! allocations so tests can check for leaks and double releases.

use crate::engine::AudioEngine;
use crate::error::{EngineError, EngineResult};
use crate::routing::SpeakerMix;
use crate::types::{
    AdvancedSettings, ChannelGroupHandle, ChannelHandle, DriverInfo, FftWindow, LoopMode,
    OutputBackend, SoftwareFormat, SoundHandle, SpeakerMode, TimeUnit,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Native frequency of every fake sound
pub const FAKE_SAMPLE_RATE: f32 = 44_100.0;

/// Length of fake sounds unless overridden
pub const DEFAULT_FAKE_LENGTH: u32 = 441_000;

const MASTER_GROUP: ChannelGroupHandle = ChannelGroupHandle::new(1);

/// A sound created on the fake engine
#[derive(Debug, Clone, PartialEq)]
pub struct FakeSound {
    pub path: PathBuf,
    pub streaming: bool,
    pub length_samples: u32,
    pub ready: bool,
}

/// Snapshot of a fake channel's parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FakeChannel {
    pub sound: SoundHandle,
    pub playing: bool,
    pub paused: bool,
    pub volume: f32,
    pub pan: f32,
    pub frequency: f32,
    pub loop_mode: LoopMode,
    pub position_samples: u32,
    pub speaker_mix: Option<SpeakerMix>,
    pub speaker_levels: BTreeMap<usize, Vec<f32>>,
}

#[derive(Debug, Default)]
struct FakeState {
    created: bool,
    started: bool,
    create_calls: usize,
    close_calls: usize,
    ticks: usize,

    drivers: Vec<DriverInfo>,
    selected_driver: Option<usize>,
    speaker_mode: Option<SpeakerMode>,
    backend: Option<OutputBackend>,
    software_format: Option<SoftwareFormat>,
    advanced: AdvancedSettings,
    max_channels: u32,
    master_volume: f32,

    fail_create: bool,
    asio_available: bool,
    streams_start_unready: bool,
    sound_length: u32,
    failing_paths: HashSet<PathBuf>,

    next_sound: u64,
    sounds: HashMap<SoundHandle, FakeSound>,
    released: Vec<SoundHandle>,
    double_releases: usize,

    next_channel: u64,
    channels: HashMap<ChannelHandle, FakeChannel>,

    spectrum_values: Vec<f32>,
    spectrum_requests: Vec<(usize, FftWindow)>,
}

/// In-memory [`AudioEngine`]
#[derive(Debug)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Engine with a single "Fake Output" driver
    pub fn new() -> Self {
        Self::with_drivers(&["Fake Output"])
    }

    /// Engine exposing drivers with the given names
    pub fn with_drivers(names: &[&str]) -> Self {
        let drivers = names
            .iter()
            .enumerate()
            .map(|(index, name)| DriverInfo {
                index,
                name: (*name).to_string(),
            })
            .collect();

        Self {
            state: Mutex::new(FakeState {
                drivers,
                sound_length: DEFAULT_FAKE_LENGTH,
                master_volume: 1.0,
                next_sound: 1,
                next_channel: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn started(&self) -> EngineResult<MutexGuard<'_, FakeState>> {
        let state = self.lock();
        if !state.created {
            return Err(EngineError::NotCreated);
        }
        if !state.started {
            return Err(EngineError::NotStarted);
        }
        Ok(state)
    }

    fn with_channel<T>(
        &self,
        channel: ChannelHandle,
        f: impl FnOnce(&mut FakeChannel) -> T,
    ) -> EngineResult<T> {
        let mut state = self.started()?;
        state
            .channels
            .get_mut(&channel)
            .map(f)
            .ok_or(EngineError::InvalidHandle)
    }

    // Configuration

    /// Make `create` fail
    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    /// Whether switching to ASIO succeeds
    pub fn set_asio_available(&self, available: bool) {
        self.lock().asio_available = available;
    }

    /// Streaming sounds start not ready until [`set_sound_ready`](Self::set_sound_ready)
    pub fn set_streams_start_unready(&self, unready: bool) {
        self.lock().streams_start_unready = unready;
    }

    /// Length given to sounds created from now on
    pub fn set_sound_length(&self, samples: u32) {
        self.lock().sound_length = samples;
    }

    /// Make `create_sound` fail for `path`
    pub fn fail_path(&self, path: impl Into<PathBuf>) {
        self.lock().failing_paths.insert(path.into());
    }

    /// Mark a sound ready or not
    pub fn set_sound_ready(&self, sound: SoundHandle, ready: bool) {
        if let Some(entry) = self.lock().sounds.get_mut(&sound) {
            entry.ready = ready;
        }
    }

    /// Values returned by `spectrum` (padded or truncated to the request)
    pub fn set_spectrum(&self, values: Vec<f32>) {
        self.lock().spectrum_values = values;
    }

    /// Simulate a channel reaching its end
    pub fn finish_channel(&self, channel: ChannelHandle) {
        if let Some(entry) = self.lock().channels.get_mut(&channel) {
            entry.playing = false;
        }
    }

    // Inspection

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    pub fn ticks(&self) -> usize {
        self.lock().ticks
    }

    pub fn selected_driver(&self) -> Option<usize> {
        self.lock().selected_driver
    }

    pub fn speaker_mode(&self) -> Option<SpeakerMode> {
        self.lock().speaker_mode
    }

    pub fn backend(&self) -> Option<OutputBackend> {
        self.lock().backend
    }

    pub fn software_format(&self) -> Option<SoftwareFormat> {
        self.lock().software_format
    }

    pub fn advanced(&self) -> AdvancedSettings {
        self.lock().advanced.clone()
    }

    pub fn max_channels(&self) -> u32 {
        self.lock().max_channels
    }

    pub fn master_volume(&self) -> f32 {
        self.lock().master_volume
    }

    /// Sounds created and not yet released
    pub fn live_sounds(&self) -> usize {
        self.lock().sounds.len()
    }

    pub fn sound(&self, sound: SoundHandle) -> Option<FakeSound> {
        self.lock().sounds.get(&sound).cloned()
    }

    /// How often `sound` was released
    pub fn release_count(&self, sound: SoundHandle) -> usize {
        self.lock().released.iter().filter(|&&s| s == sound).count()
    }

    /// Releases of sounds that were not live
    pub fn double_releases(&self) -> usize {
        self.lock().double_releases
    }

    pub fn channel(&self, channel: ChannelHandle) -> Option<FakeChannel> {
        self.lock().channels.get(&channel).cloned()
    }

    /// Channels currently playing
    pub fn playing_channels(&self) -> usize {
        self.lock().channels.values().filter(|c| c.playing).count()
    }

    /// Playing channels of one sound
    pub fn playing_channels_of(&self, sound: SoundHandle) -> usize {
        self.lock()
            .channels
            .values()
            .filter(|c| c.playing && c.sound == sound)
            .count()
    }

    pub fn spectrum_requests(&self) -> Vec<(usize, FftWindow)> {
        self.lock().spectrum_requests.clone()
    }
}

impl AudioEngine for FakeEngine {
    fn create(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.create_calls += 1;
        if state.fail_create {
            return Err(EngineError::Device("fake create failure".to_string()));
        }
        state.created = true;
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.created = false;
        state.started = false;
        state.channels.clear();
        // Streaming sounds belong to the engine
        state.sounds.retain(|_, sound| !sound.streaming);
        Ok(())
    }

    fn drivers(&self) -> EngineResult<Vec<DriverInfo>> {
        let state = self.lock();
        if !state.created {
            return Err(EngineError::NotCreated);
        }
        Ok(state.drivers.clone())
    }

    fn select_driver(&self, index: usize) -> EngineResult<()> {
        let mut state = self.lock();
        if index != 0 && index >= state.drivers.len() {
            return Err(EngineError::Device(format!("no driver {}", index)));
        }
        state.selected_driver = Some(index);
        Ok(())
    }

    fn set_speaker_mode(&self, mode: SpeakerMode) -> EngineResult<()> {
        self.lock().speaker_mode = Some(mode);
        Ok(())
    }

    fn set_output_backend(&self, backend: OutputBackend) -> EngineResult<()> {
        let mut state = self.lock();
        if backend == OutputBackend::Asio && !state.asio_available {
            return Err(EngineError::BackendUnavailable(backend.to_string()));
        }
        state.backend = Some(backend);
        Ok(())
    }

    fn set_software_format(&self, format: SoftwareFormat) -> EngineResult<()> {
        self.lock().software_format = Some(format);
        Ok(())
    }

    fn start(&self, max_channels: u32) -> EngineResult<ChannelGroupHandle> {
        let mut state = self.lock();
        if !state.created {
            return Err(EngineError::NotCreated);
        }
        state.started = true;
        state.max_channels = max_channels;
        Ok(MASTER_GROUP)
    }

    fn advanced_settings(&self) -> EngineResult<AdvancedSettings> {
        Ok(self.started()?.advanced.clone())
    }

    fn set_advanced_settings(&self, settings: &AdvancedSettings) -> EngineResult<()> {
        self.started()?.advanced = settings.clone();
        Ok(())
    }

    fn create_sound(&self, path: &Path, streaming: bool) -> EngineResult<SoundHandle> {
        let mut state = self.started()?;
        if state.failing_paths.contains(path) {
            return Err(EngineError::Decode(format!("cannot open {}", path.display())));
        }

        let handle = SoundHandle::new(state.next_sound);
        state.next_sound += 1;
        let sound = FakeSound {
            path: path.to_path_buf(),
            streaming,
            length_samples: state.sound_length,
            ready: !(streaming && state.streams_start_unready),
        };
        state.sounds.insert(handle, sound);
        Ok(handle)
    }

    fn release_sound(&self, sound: SoundHandle) -> EngineResult<()> {
        let mut state = self.lock();
        state.released.push(sound);
        if state.sounds.remove(&sound).is_none() {
            state.double_releases += 1;
            return Err(EngineError::InvalidHandle);
        }
        state.channels.retain(|_, channel| channel.sound != sound);
        Ok(())
    }

    fn sound_length_samples(&self, sound: SoundHandle) -> EngineResult<u32> {
        self.lock()
            .sounds
            .get(&sound)
            .map(|s| s.length_samples)
            .ok_or(EngineError::InvalidHandle)
    }

    fn is_sound_ready(&self, sound: SoundHandle) -> EngineResult<bool> {
        self.lock()
            .sounds
            .get(&sound)
            .map(|s| s.ready)
            .ok_or(EngineError::InvalidHandle)
    }

    fn play_sound(&self, sound: SoundHandle, paused: bool) -> EngineResult<ChannelHandle> {
        let mut state = self.started()?;
        match state.sounds.get(&sound) {
            None => return Err(EngineError::InvalidHandle),
            Some(s) if !s.ready => return Err(EngineError::NotReady),
            Some(_) => {}
        }

        if state.channels.len() >= state.max_channels as usize {
            return Err(EngineError::NoFreeChannel);
        }

        let handle = ChannelHandle::new(state.next_channel);
        state.next_channel += 1;
        state.channels.insert(
            handle,
            FakeChannel {
                sound,
                playing: true,
                paused,
                volume: 1.0,
                pan: 0.0,
                frequency: FAKE_SAMPLE_RATE,
                loop_mode: LoopMode::Off,
                position_samples: 0,
                speaker_mix: None,
                speaker_levels: BTreeMap::new(),
            },
        );
        Ok(handle)
    }

    fn stop_channel(&self, channel: ChannelHandle) -> EngineResult<()> {
        let mut state = self.started()?;
        state
            .channels
            .remove(&channel)
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool> {
        self.with_channel(channel, |c| c.playing)
    }

    fn channel_frequency(&self, channel: ChannelHandle) -> EngineResult<f32> {
        self.with_channel(channel, |c| c.frequency)
    }

    fn set_channel_frequency(&self, channel: ChannelHandle, frequency: f32) -> EngineResult<()> {
        self.with_channel(channel, |c| c.frequency = frequency)
    }

    fn set_channel_volume(&self, channel: ChannelHandle, volume: f32) -> EngineResult<()> {
        self.with_channel(channel, |c| c.volume = volume)
    }

    fn set_channel_pan(&self, channel: ChannelHandle, pan: f32) -> EngineResult<()> {
        self.with_channel(channel, |c| {
            c.pan = pan;
            c.speaker_mix = None;
            c.speaker_levels.clear();
        })
    }

    fn set_channel_paused(&self, channel: ChannelHandle, paused: bool) -> EngineResult<()> {
        self.with_channel(channel, |c| c.paused = paused)
    }

    fn set_channel_loop(&self, channel: ChannelHandle, mode: LoopMode) -> EngineResult<()> {
        self.with_channel(channel, |c| c.loop_mode = mode)
    }

    fn set_channel_position(
        &self,
        channel: ChannelHandle,
        position: u32,
        unit: TimeUnit,
    ) -> EngineResult<()> {
        let samples = match unit {
            TimeUnit::Pcm => position,
            TimeUnit::Ms => (u64::from(position) * FAKE_SAMPLE_RATE as u64 / 1000) as u32,
        };
        self.with_channel(channel, |c| c.position_samples = samples)
    }

    fn channel_position(&self, channel: ChannelHandle, unit: TimeUnit) -> EngineResult<u32> {
        let samples = self.with_channel(channel, |c| c.position_samples)?;
        Ok(match unit {
            TimeUnit::Pcm => samples,
            TimeUnit::Ms => (u64::from(samples) * 1000 / FAKE_SAMPLE_RATE as u64) as u32,
        })
    }

    fn set_channel_speaker_mix(&self, channel: ChannelHandle, mix: &SpeakerMix) -> EngineResult<()> {
        self.with_channel(channel, |c| c.speaker_mix = Some(*mix))
    }

    fn set_channel_speaker_levels(
        &self,
        channel: ChannelHandle,
        speaker: usize,
        levels: &[f32],
    ) -> EngineResult<()> {
        self.with_channel(channel, |c| {
            c.speaker_levels.insert(speaker, levels.to_vec());
        })
    }

    fn stop_group(&self, group: ChannelGroupHandle) -> EngineResult<()> {
        let mut state = self.started()?;
        if group != MASTER_GROUP {
            return Err(EngineError::InvalidHandle);
        }
        state.channels.clear();
        Ok(())
    }

    fn set_group_volume(&self, group: ChannelGroupHandle, volume: f32) -> EngineResult<()> {
        let mut state = self.started()?;
        if group != MASTER_GROUP {
            return Err(EngineError::InvalidHandle);
        }
        state.master_volume = volume;
        Ok(())
    }

    fn spectrum(&self, bands: usize, window: FftWindow) -> EngineResult<Vec<f32>> {
        let mut state = self.started()?;
        state.spectrum_requests.push((bands, window));
        let mut values = state.spectrum_values.clone();
        values.resize(bands, 0.0);
        Ok(values)
    }

    fn update(&self) -> EngineResult<()> {
        let mut state = self.started()?;
        state.ticks += 1;
        state.channels.retain(|_, channel| channel.playing);
        Ok(())
    }
}
