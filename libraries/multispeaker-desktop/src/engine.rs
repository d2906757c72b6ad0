//! `AudioEngine` implementation on CPAL
//!
//! Sounds are decoded with Symphonia into memory. Streaming sounds have their
//! header read synchronously (so their length is known at once) and are
//! decoded on a background loader thread; they report ready once decoding
//! finishes.

use crate::backend;
use crate::decoder::{self, SoundData};
use crate::device;
use crate::mixer::{analyze_spectrum, Mixer};
use crate::output::{OutputRequest, OutputStream, StreamInfo};
use multispeaker_core::types::{
    AdvancedSettings, FftWindow, LoopMode, SoftwareFormat, SpeakerMode, TimeUnit,
};
use multispeaker_core::{
    AudioEngine, ChannelGroupHandle, ChannelHandle, DriverInfo, EngineError, EngineResult,
    OutputBackend, SoundHandle, SpeakerMix,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const MASTER_GROUP: ChannelGroupHandle = ChannelGroupHandle::new(1);

/// Decoded data shared with a loader thread
#[derive(Debug, Default)]
struct SoundSlot {
    data: OnceLock<Arc<SoundData>>,
    error: OnceLock<String>,
    cancel: AtomicBool,
}

struct SoundEntry {
    path: PathBuf,
    streaming: bool,
    length_frames: u32,
    slot: Arc<SoundSlot>,
    loader: Option<JoinHandle<()>>,
}

impl SoundEntry {
    fn cancel_loader(&mut self) {
        self.slot.cancel.store(true, Ordering::Relaxed);
        self.join_loader();
    }

    /// Join the loader if it has exited; no-op while it is still decoding
    fn reap_loader(&mut self) {
        if self.loader.as_ref().is_some_and(JoinHandle::is_finished) {
            self.join_loader();
        }
    }

    fn join_loader(&mut self) {
        if let Some(loader) = self.loader.take() {
            if loader.join().is_err() {
                error!("Loader thread for {} panicked", self.path.display());
            }
        }
    }
}

struct EngineState {
    created: bool,
    backend: OutputBackend,
    driver_index: usize,
    speaker_mode: SpeakerMode,
    software_format: Option<SoftwareFormat>,
    advanced: AdvancedSettings,
    output: Option<OutputStream>,
    sounds: HashMap<SoundHandle, SoundEntry>,
    next_sound: u64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            created: false,
            backend: OutputBackend::Default,
            driver_index: 0,
            speaker_mode: SpeakerMode::Default,
            software_format: None,
            advanced: AdvancedSettings::default(),
            output: None,
            sounds: HashMap::new(),
            next_sound: 1,
        }
    }
}

/// Desktop audio engine
pub struct CpalEngine {
    state: Mutex<EngineState>,
    mixer: Arc<Mutex<Mixer>>,
}

impl Default for CpalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            mixer: Arc::new(Mutex::new(Mixer::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mixer(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn created(&self) -> EngineResult<MutexGuard<'_, EngineState>> {
        let state = self.lock();
        if state.created {
            Ok(state)
        } else {
            Err(EngineError::NotCreated)
        }
    }

    /// Format of the running output, if started
    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.lock().output.as_ref().map(OutputStream::info)
    }

    /// Speaker mode last requested
    pub fn speaker_mode(&self) -> SpeakerMode {
        self.lock().speaker_mode
    }

    /// Output channel count to request from the device
    fn preferred_format(state: &EngineState) -> Option<SoftwareFormat> {
        match (state.software_format, state.speaker_mode) {
            (Some(format), _) => Some(format),
            (None, SpeakerMode::Stereo) => Some(SoftwareFormat {
                output_channels: 2,
                ..SoftwareFormat::default()
            }),
            (None, SpeakerMode::Surround71) => Some(SoftwareFormat {
                output_channels: 8,
                ..SoftwareFormat::default()
            }),
            (None, _) => None,
        }
    }

    fn spawn_loader(path: &Path, slot: &Arc<SoundSlot>) -> EngineResult<JoinHandle<()>> {
        let path = path.to_path_buf();
        let slot = Arc::clone(slot);

        thread::Builder::new()
            .name("sound-loader".to_string())
            .spawn(move || match decoder::decode_with_cancel(&path, &slot.cancel) {
                Ok(data) => {
                    debug!("Streaming sound ready: {}", path.display());
                    let _ = slot.data.set(Arc::new(data));
                }
                Err(e) => {
                    if !slot.cancel.load(Ordering::Relaxed) {
                        warn!("Failed to decode {}: {}", path.display(), e);
                    }
                    let _ = slot.error.set(e.to_string());
                }
            })
            .map_err(EngineError::Io)
    }

    fn sound_data(&self, sound: SoundHandle) -> EngineResult<Arc<SoundData>> {
        let state = self.lock();
        let entry = state.sounds.get(&sound).ok_or(EngineError::InvalidHandle)?;
        if let Some(data) = entry.slot.data.get() {
            return Ok(Arc::clone(data));
        }
        match entry.slot.error.get() {
            Some(message) => Err(EngineError::Decode(message.clone())),
            None => Err(EngineError::NotReady),
        }
    }
}

impl AudioEngine for CpalEngine {
    fn create(&self) -> EngineResult<()> {
        let mut state = self.lock();
        if !state.created {
            state.created = true;
            info!("Audio engine created");
        }
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.output = None;
        self.mixer().reset();

        // Streaming sounds belong to the engine
        let streaming: Vec<SoundHandle> = state
            .sounds
            .iter()
            .filter(|(_, entry)| entry.streaming)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in streaming {
            if let Some(mut entry) = state.sounds.remove(&handle) {
                entry.cancel_loader();
            }
        }

        state.created = false;
        info!("Audio engine closed");
        Ok(())
    }

    fn drivers(&self) -> EngineResult<Vec<DriverInfo>> {
        let backend = self.created()?.backend;
        Ok(device::list_output_devices(backend)?)
    }

    fn select_driver(&self, index: usize) -> EngineResult<()> {
        self.lock().driver_index = index;
        Ok(())
    }

    fn set_speaker_mode(&self, mode: SpeakerMode) -> EngineResult<()> {
        self.lock().speaker_mode = mode;
        Ok(())
    }

    fn set_output_backend(&self, backend: OutputBackend) -> EngineResult<()> {
        backend::host_for(backend)?;
        self.lock().backend = backend;
        Ok(())
    }

    fn set_software_format(&self, format: SoftwareFormat) -> EngineResult<()> {
        if format.output_channels == 0 || format.sample_rate == 0 {
            return Err(EngineError::UnsupportedFormat(format!("{:?}", format)));
        }
        self.lock().software_format = Some(format);
        Ok(())
    }

    fn start(&self, max_channels: u32) -> EngineResult<ChannelGroupHandle> {
        let mut state = self.created()?;
        if state.output.is_some() {
            return Ok(MASTER_GROUP);
        }

        let request = OutputRequest {
            backend: state.backend,
            driver_index: state.driver_index,
            preferred: Self::preferred_format(&state),
        };
        let output = OutputStream::open(request, Arc::clone(&self.mixer))?;
        let info = output.info();

        self.mixer().configure(
            max_channels as usize,
            usize::from(info.channels),
            info.sample_rate,
        );
        state.output = Some(output);

        Ok(MASTER_GROUP)
    }

    fn advanced_settings(&self) -> EngineResult<AdvancedSettings> {
        Ok(self.created()?.advanced.clone())
    }

    fn set_advanced_settings(&self, settings: &AdvancedSettings) -> EngineResult<()> {
        let mut state = self.created()?;
        if settings.asio_speaker_list.len() < settings.asio_channel_count as usize {
            return Err(EngineError::Other(format!(
                "speaker list has {} entries for {} channels",
                settings.asio_speaker_list.len(),
                settings.asio_channel_count
            )));
        }

        state.advanced = settings.clone();
        self.mixer()
            .set_speaker_map(settings.asio_speaker_list.clone());
        Ok(())
    }

    fn create_sound(&self, path: &Path, streaming: bool) -> EngineResult<SoundHandle> {
        drop(self.created()?);

        let slot = Arc::new(SoundSlot::default());
        let (length_frames, loader) = if streaming {
            let header = decoder::read_header(path)?;
            let frames = header.frames.unwrap_or(0).min(u64::from(u32::MAX)) as u32;
            (frames, Some(Self::spawn_loader(path, &slot)?))
        } else {
            let data = decoder::decode_file(path)?;
            let frames = data.frames().min(u32::MAX as usize) as u32;
            let _ = slot.data.set(Arc::new(data));
            (frames, None)
        };

        let mut state = self.lock();
        let handle = SoundHandle::new(state.next_sound);
        state.next_sound += 1;
        state.sounds.insert(
            handle,
            SoundEntry {
                path: path.to_path_buf(),
                streaming,
                length_frames,
                slot,
                loader,
            },
        );

        debug!(
            "Created sound {:?} from {} ({} frames, streaming: {})",
            handle,
            path.display(),
            length_frames,
            streaming
        );
        Ok(handle)
    }

    fn release_sound(&self, sound: SoundHandle) -> EngineResult<()> {
        let mut entry = self
            .lock()
            .sounds
            .remove(&sound)
            .ok_or(EngineError::InvalidHandle)?;

        self.mixer().stop_sound(sound.raw());
        entry.cancel_loader();
        Ok(())
    }

    fn sound_length_samples(&self, sound: SoundHandle) -> EngineResult<u32> {
        let state = self.lock();
        let entry = state.sounds.get(&sound).ok_or(EngineError::InvalidHandle)?;
        Ok(match entry.slot.data.get() {
            Some(data) => data.frames().min(u32::MAX as usize) as u32,
            None => entry.length_frames,
        })
    }

    fn is_sound_ready(&self, sound: SoundHandle) -> EngineResult<bool> {
        match self.sound_data(sound) {
            Ok(_) => Ok(true),
            Err(EngineError::NotReady) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn play_sound(&self, sound: SoundHandle, paused: bool) -> EngineResult<ChannelHandle> {
        let data = self.sound_data(sound)?;
        self.mixer().play(sound.raw(), data, paused)
    }

    fn stop_channel(&self, channel: ChannelHandle) -> EngineResult<()> {
        self.mixer().stop(channel)
    }

    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool> {
        self.mixer().is_playing(channel)
    }

    fn channel_frequency(&self, channel: ChannelHandle) -> EngineResult<f32> {
        Ok(self.mixer().voice(channel)?.frequency())
    }

    fn set_channel_frequency(&self, channel: ChannelHandle, frequency: f32) -> EngineResult<()> {
        self.mixer().set_frequency(channel, frequency)
    }

    fn set_channel_volume(&self, channel: ChannelHandle, volume: f32) -> EngineResult<()> {
        self.mixer().set_volume(channel, volume)
    }

    fn set_channel_pan(&self, channel: ChannelHandle, pan: f32) -> EngineResult<()> {
        self.mixer().set_pan(channel, pan)
    }

    fn set_channel_paused(&self, channel: ChannelHandle, paused: bool) -> EngineResult<()> {
        self.mixer().set_paused(channel, paused)
    }

    fn set_channel_loop(&self, channel: ChannelHandle, mode: LoopMode) -> EngineResult<()> {
        self.mixer().set_loop(channel, mode)
    }

    fn set_channel_position(
        &self,
        channel: ChannelHandle,
        position: u32,
        unit: TimeUnit,
    ) -> EngineResult<()> {
        self.mixer().set_position(channel, position, unit)
    }

    fn channel_position(&self, channel: ChannelHandle, unit: TimeUnit) -> EngineResult<u32> {
        self.mixer().position(channel, unit)
    }

    fn set_channel_speaker_mix(&self, channel: ChannelHandle, mix: &SpeakerMix) -> EngineResult<()> {
        self.mixer().set_speaker_mix(channel, mix)
    }

    fn set_channel_speaker_levels(
        &self,
        channel: ChannelHandle,
        speaker: usize,
        levels: &[f32],
    ) -> EngineResult<()> {
        self.mixer().set_speaker_levels(channel, speaker, levels)
    }

    fn stop_group(&self, group: ChannelGroupHandle) -> EngineResult<()> {
        if group != MASTER_GROUP {
            return Err(EngineError::InvalidHandle);
        }
        self.mixer().stop_all();
        Ok(())
    }

    fn set_group_volume(&self, group: ChannelGroupHandle, volume: f32) -> EngineResult<()> {
        if group != MASTER_GROUP {
            return Err(EngineError::InvalidHandle);
        }
        self.mixer().set_master_volume(volume);
        Ok(())
    }

    fn spectrum(&self, bands: usize, window: FftWindow) -> EngineResult<Vec<f32>> {
        // Copy the samples out so the FFT never blocks the output callback.
        let samples = {
            let mixer = self.mixer();
            if !mixer.is_configured() {
                return Err(EngineError::NotStarted);
            }
            mixer.recent_samples(bands * 2)
        };
        Ok(analyze_spectrum(&samples, bands, window))
    }

    fn update(&self) -> EngineResult<()> {
        let reclaimed = self.mixer().reclaim_finished();
        if reclaimed > 0 {
            debug!("Reclaimed {} finished channels", reclaimed);
        }

        let mut state = self.lock();
        for entry in state.sounds.values_mut() {
            entry.reap_loader();
        }
        Ok(())
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        let mut state = self.lock();
        state.output = None;
        for entry in state.sounds.values_mut() {
            entry.cancel_loader();
        }
    }
}
