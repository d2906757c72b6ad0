//! Sound player
//!
//! One player per sound asset. The player owns the loaded sound resource and
//! borrows a playback channel from the engine each time it plays. Cached
//! settings (volume, pan, speed, loop, pause) survive across channels and are
//! re-applied on every start.
//!
//! State lives behind an `Arc<Mutex<_>>` shared only with the player's own
//! deferred-playback waiters. Lock order is player state, then session state.

use crate::engine::AudioEngine;
use crate::error::{EngineError, EngineResult};
use crate::pending::{PendingPlay, PlayOutcome};
use crate::routing::{self, LegacySpeaker, SpeakerSelector};
use crate::session::EngineSession;
use crate::types::{ChannelHandle, LoopMode, SoundHandle, TimeUnit};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Ownership of a loaded sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundResource {
    /// Decoded sound released by the player on unload
    Owned(SoundHandle),

    /// Streaming sound owned and released by the engine
    EngineManaged(SoundHandle),
}

impl SoundResource {
    /// Engine handle of the sound
    pub fn handle(&self) -> SoundHandle {
        match *self {
            Self::Owned(handle) | Self::EngineManaged(handle) => handle,
        }
    }

    /// Release the sound if the player owns it
    fn release<E: AudioEngine + ?Sized>(self, engine: &E) {
        match self {
            Self::Owned(handle) => {
                if let Err(e) = engine.release_sound(handle) {
                    warn!("Failed to release sound {:?}: {}", handle, e);
                }
            }
            Self::EngineManaged(handle) => {
                debug!("Leaving streaming sound {:?} to the engine", handle);
            }
        }
    }
}

/// Observable player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// Nothing loaded
    Unloaded,
    /// Sound loaded, no live channel
    Loaded,
    /// Channel playing
    Playing,
    /// Channel alive but paused
    Paused,
}

/// Cached player state
#[derive(Debug)]
struct PlayerInner {
    resource: Option<SoundResource>,
    path: Option<PathBuf>,
    length_samples: u32,
    multi_play: bool,
    looping: bool,
    paused: bool,
    pan: f32,
    volume: f32,
    speed: f32,
    base_frequency: f32,
    channel: Option<ChannelHandle>,
}

impl Default for PlayerInner {
    fn default() -> Self {
        Self {
            resource: None,
            path: None,
            length_samples: 0,
            multi_play: false,
            looping: false,
            paused: false,
            pan: 0.0,
            volume: 1.0,
            speed: 1.0,
            base_frequency: 0.0,
            channel: None,
        }
    }
}

impl PlayerInner {
    /// Live channel, if the engine still reports it as playing
    fn live_channel<E: AudioEngine + ?Sized>(&self, engine: &E) -> Option<ChannelHandle> {
        self.resource?;
        let channel = self.channel?;
        engine
            .is_channel_playing(channel)
            .unwrap_or(false)
            .then_some(channel)
    }

    fn stop_channel<E: AudioEngine + ?Sized>(&mut self, engine: &E) {
        if let Some(channel) = self.channel.take() {
            match engine.stop_channel(channel) {
                Ok(()) | Err(EngineError::InvalidHandle) => {}
                Err(e) => debug!("Failed to stop channel {:?}: {}", channel, e),
            }
        }
    }
}

/// Open a channel for the loaded sound and apply cached state
///
/// `selector == None` plays with default stereo placement and the cached
/// paused flag; a selector routes the channel and starts it unpaused. The
/// engine is ticked afterwards whether or not the channel opened.
fn start_channel<E: AudioEngine>(
    session: &EngineSession<E>,
    state: &mut PlayerInner,
    selector: Option<&SpeakerSelector>,
) -> EngineResult<ChannelHandle> {
    let sound = state
        .resource
        .map(|resource| resource.handle())
        .ok_or(EngineError::InvalidHandle)?;
    let engine = session.engine();

    if state.looping || !state.multi_play {
        state.stop_channel(engine);
    }

    let result = open_channel(engine, state, sound, selector);

    // The engine only reuses finished channels after a tick.
    session.update();

    result
}

fn open_channel<E: AudioEngine + ?Sized>(
    engine: &E,
    state: &mut PlayerInner,
    sound: SoundHandle,
    selector: Option<&SpeakerSelector>,
) -> EngineResult<ChannelHandle> {
    let start_paused = match selector {
        Some(_) => true,
        None => state.paused,
    };
    let channel = engine.play_sound(sound, start_paused)?;
    state.channel = Some(channel);

    if let Some(selector) = selector {
        routing::route(engine, channel, selector);
        if let Err(e) = engine.set_channel_paused(channel, false) {
            warn!("Failed to unpause routed channel {:?}: {}", channel, e);
        }
        state.paused = false;
    }

    match engine.channel_frequency(channel) {
        Ok(frequency) => state.base_frequency = frequency,
        Err(e) => warn!("Failed to read frequency of {:?}: {}", channel, e),
    }

    if let Err(e) = engine.set_channel_volume(channel, state.volume) {
        debug!("Failed to set volume on {:?}: {}", channel, e);
    }
    if selector.is_none() {
        if let Err(e) = engine.set_channel_pan(channel, state.pan.clamp(-1.0, 1.0)) {
            debug!("Failed to set pan on {:?}: {}", channel, e);
        }
    }
    if let Err(e) = engine.set_channel_frequency(channel, state.base_frequency * state.speed) {
        debug!("Failed to set frequency on {:?}: {}", channel, e);
    }
    if let Err(e) = engine.set_channel_loop(channel, LoopMode::from(state.looping)) {
        debug!("Failed to set loop mode on {:?}: {}", channel, e);
    }

    Ok(channel)
}

/// Deferred-playback waiter thread owned by a player
struct Waiter {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// A loaded sound and its playback channel
pub struct SoundPlayer<E: AudioEngine + 'static> {
    session: Arc<EngineSession<E>>,
    inner: Arc<Mutex<PlayerInner>>,
    waiters: Vec<Waiter>,
}

impl<E: AudioEngine + 'static> SoundPlayer<E> {
    /// Create an empty player on a shared session
    pub fn new(session: Arc<EngineSession<E>>) -> Self {
        Self {
            session,
            inner: Arc::new(Mutex::new(PlayerInner::default())),
            waiters: Vec::new(),
        }
    }

    /// The session this player plays through
    pub fn session(&self) -> &Arc<EngineSession<E>> {
        &self.session
    }

    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        lock_inner(&self.inner)
    }

    /// Load a sound, replacing any previous one
    ///
    /// Streaming sounds are left to the engine on unload. Multi-play is reset
    /// on every load. Returns `false` and leaves the player unloaded when the
    /// engine or the file is unusable.
    pub fn load(&mut self, path: impl AsRef<Path>, stream: bool) -> bool {
        let path = path.as_ref();

        self.unload();
        self.lock().multi_play = false;

        if !self.session.ensure_initialized() {
            error!("Cannot load {}: audio engine unavailable", path.display());
            return false;
        }

        let engine = self.session.engine();
        let sound = match engine.create_sound(path, stream) {
            Ok(sound) => sound,
            Err(e) => {
                error!("Failed to load sound {}: {}", path.display(), e);
                return false;
            }
        };

        let length_samples = engine.sound_length_samples(sound).unwrap_or_else(|e| {
            warn!("Failed to read length of {}: {}", path.display(), e);
            0
        });

        let mut state = self.lock();
        state.resource = Some(if stream {
            SoundResource::EngineManaged(sound)
        } else {
            SoundResource::Owned(sound)
        });
        state.path = Some(path.to_path_buf());
        state.length_samples = length_samples;

        info!(
            "Loaded {} ({} samples{})",
            path.display(),
            length_samples,
            if stream { ", streaming" } else { "" }
        );
        true
    }

    /// Stop playback and release the loaded sound
    ///
    /// Waits for any deferred playback request to finish first.
    pub fn unload(&mut self) {
        self.join_waiters();

        let engine = self.session.engine();
        let mut state = self.lock();
        let Some(resource) = state.resource.take() else {
            return;
        };

        state.stop_channel(engine);
        resource.release(engine);

        if let Some(path) = state.path.take() {
            debug!("Unloaded {}", path.display());
        }
        state.length_samples = 0;
        state.base_frequency = 0.0;
    }

    /// Play with default stereo placement
    pub fn play(&mut self) {
        let mut state = self.lock();
        if state.resource.is_none() {
            warn!("play() called with nothing loaded");
            return;
        }

        if let Err(e) = start_channel(&self.session, &mut state, None) {
            warn!("Failed to start playback: {}", e);
        }
    }

    /// Play routed to `selector`
    pub fn play_to(&mut self, selector: impl Into<SpeakerSelector>) {
        let selector = selector.into();
        let mut state = self.lock();
        if state.resource.is_none() {
            warn!("play_to() called with nothing loaded");
            return;
        }

        if let Err(e) = start_channel(&self.session, &mut state, Some(&selector)) {
            warn!("Failed to start routed playback: {}", e);
        }
    }

    /// Play routed by legacy speaker index (0 back, 1 side, 2 front, 3 center)
    ///
    /// Other indices play with default placement.
    pub fn play_to_speaker(&mut self, speaker: i32) {
        match LegacySpeaker::try_from(speaker) {
            Ok(speaker) => self.play_to(speaker),
            Err(index) => {
                debug!("Unknown speaker index {}, using default placement", index);
                let mut state = self.lock();
                if state.resource.is_none() {
                    warn!("play_to_speaker() called with nothing loaded");
                    return;
                }
                let result = start_channel(&self.session, &mut state, None).and_then(|channel| {
                    let engine = self.session.engine();
                    engine.set_channel_paused(channel, false)?;
                    state.paused = false;
                    Ok(channel)
                });
                if let Err(e) = result {
                    warn!("Failed to start playback: {}", e);
                }
            }
        }
    }

    /// Play routed to `selector` once the sound is ready
    ///
    /// Readiness is polled on a background thread at the session's configured
    /// interval until its timeout. The returned handle reports the outcome.
    pub fn play_to_when_ready(&mut self, selector: impl Into<SpeakerSelector>) -> PendingPlay {
        let selector = selector.into();
        self.reap_waiters();

        let Some(sound) = self.lock().resource.map(|resource| resource.handle()) else {
            warn!("play_to_when_ready() called with nothing loaded");
            return PendingPlay::finished(PlayOutcome::NotLoaded);
        };

        let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));

        let session = Arc::clone(&self.session);
        let inner = Arc::clone(&self.inner);
        let waiter_cancel = Arc::clone(&cancel);

        let spawned = thread::Builder::new()
            .name("play-to-waiter".to_string())
            .spawn(move || {
                let outcome = wait_and_play(&session, &inner, sound, &selector, &waiter_cancel);
                debug!("Deferred playback of {:?} finished: {:?}", sound, outcome);
                let _ = outcome_tx.send(outcome);
            });

        match spawned {
            Ok(handle) => {
                self.waiters.push(Waiter {
                    handle,
                    cancel: Arc::clone(&cancel),
                });
                PendingPlay::new(outcome_rx, cancel)
            }
            Err(e) => {
                error!("Failed to spawn playback waiter: {}", e);
                PendingPlay::finished(PlayOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Cancel and join every waiter
    fn join_waiters(&mut self) {
        for waiter in &self.waiters {
            waiter.cancel.store(true, Ordering::Release);
        }
        for waiter in self.waiters.drain(..) {
            if waiter.handle.join().is_err() {
                error!("Playback waiter panicked");
            }
        }
    }

    /// Join waiters that already finished
    fn reap_waiters(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .waiters
            .drain(..)
            .partition(|waiter| waiter.handle.is_finished());
        self.waiters = running;
        for waiter in finished {
            if waiter.handle.join().is_err() {
                error!("Playback waiter panicked");
            }
        }
    }

    /// Number of deferred requests still running
    pub fn pending_requests(&self) -> usize {
        self.waiters
            .iter()
            .filter(|waiter| !waiter.handle.is_finished())
            .count()
    }

    /// Stop the current channel; the sound stays loaded
    pub fn stop(&mut self) {
        let engine = self.session.engine();
        self.lock().stop_channel(engine);
    }

    /// Set volume; applied live while playing
    pub fn set_volume(&mut self, volume: f32) {
        let engine = self.session.engine();
        let mut state = self.lock();
        state.volume = volume;
        if let Some(channel) = state.live_channel(engine) {
            if let Err(e) = engine.set_channel_volume(channel, volume) {
                debug!("Failed to set volume on {:?}: {}", channel, e);
            }
        }
    }

    /// Set pan; stored as given, applied clamped to [-1, 1] while playing
    pub fn set_pan(&mut self, pan: f32) {
        let engine = self.session.engine();
        let mut state = self.lock();
        state.pan = pan;
        if let Some(channel) = state.live_channel(engine) {
            if let Err(e) = engine.set_channel_pan(channel, pan.clamp(-1.0, 1.0)) {
                debug!("Failed to set pan on {:?}: {}", channel, e);
            }
        }
    }

    /// Set speed multiplier (negative plays backwards); applied live while playing
    pub fn set_speed(&mut self, speed: f32) {
        let engine = self.session.engine();
        let mut state = self.lock();
        state.speed = speed;
        if let Some(channel) = state.live_channel(engine) {
            let frequency = state.base_frequency * speed;
            if let Err(e) = engine.set_channel_frequency(channel, frequency) {
                debug!("Failed to set frequency on {:?}: {}", channel, e);
            }
        }
    }

    /// Set looping; applied live while playing
    pub fn set_loop(&mut self, looping: bool) {
        let engine = self.session.engine();
        let mut state = self.lock();
        state.looping = looping;
        if let Some(channel) = state.live_channel(engine) {
            if let Err(e) = engine.set_channel_loop(channel, LoopMode::from(looping)) {
                debug!("Failed to set loop mode on {:?}: {}", channel, e);
            }
        }
    }

    /// Pause or resume; applied live while playing
    pub fn set_paused(&mut self, paused: bool) {
        let engine = self.session.engine();
        let mut state = self.lock();
        state.paused = paused;
        if let Some(channel) = state.live_channel(engine) {
            if let Err(e) = engine.set_channel_paused(channel, paused) {
                debug!("Failed to set paused on {:?}: {}", channel, e);
            }
        }
    }

    /// Allow overlapping plays of this sound
    pub fn set_multi_play(&mut self, enabled: bool) {
        self.lock().multi_play = enabled;
    }

    /// Seek to a fraction of the sound length; only while playing
    pub fn set_position(&mut self, fraction: f32) {
        let engine = self.session.engine();
        let state = self.lock();
        if let Some(channel) = state.live_channel(engine) {
            let samples = (state.length_samples as f32 * fraction) as u32;
            if let Err(e) = engine.set_channel_position(channel, samples, TimeUnit::Pcm) {
                debug!("Failed to seek {:?}: {}", channel, e);
            }
        }
    }

    /// Seek to `ms` milliseconds; only while playing
    pub fn set_position_ms(&mut self, ms: u32) {
        let engine = self.session.engine();
        let state = self.lock();
        if let Some(channel) = state.live_channel(engine) {
            if let Err(e) = engine.set_channel_position(channel, ms, TimeUnit::Ms) {
                debug!("Failed to seek {:?}: {}", channel, e);
            }
        }
    }

    /// Playback position as a fraction of the length; 0 when not playing
    pub fn position(&self) -> f32 {
        let engine = self.session.engine();
        let state = self.lock();
        let Some(channel) = state.live_channel(engine) else {
            return 0.0;
        };
        if state.length_samples == 0 {
            return 0.0;
        }
        match engine.channel_position(channel, TimeUnit::Pcm) {
            Ok(samples) => samples as f32 / state.length_samples as f32,
            Err(_) => 0.0,
        }
    }

    /// Playback position in milliseconds; 0 when not playing
    pub fn position_ms(&self) -> u32 {
        let engine = self.session.engine();
        let state = self.lock();
        state
            .live_channel(engine)
            .and_then(|channel| engine.channel_position(channel, TimeUnit::Ms).ok())
            .unwrap_or(0)
    }

    /// Whether a channel of this player is playing (paused counts)
    pub fn is_playing(&self) -> bool {
        let engine = self.session.engine();
        self.lock().live_channel(engine).is_some()
    }

    /// Current state
    pub fn state(&self) -> PlayerState {
        let engine = self.session.engine();
        let state = self.lock();
        if state.resource.is_none() {
            PlayerState::Unloaded
        } else if state.live_channel(engine).is_none() {
            PlayerState::Loaded
        } else if state.paused {
            PlayerState::Paused
        } else {
            PlayerState::Playing
        }
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn pan(&self) -> f32 {
        self.lock().pan
    }

    pub fn speed(&self) -> f32 {
        self.lock().speed
    }

    pub fn is_looping(&self) -> bool {
        self.lock().looping
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_multi_play(&self) -> bool {
        self.lock().multi_play
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().resource.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.lock().resource, Some(SoundResource::EngineManaged(_)))
    }

    /// Length of the loaded sound in PCM samples
    pub fn length_samples(&self) -> u32 {
        self.lock().length_samples
    }

    /// Channel frequency captured at the last start
    pub fn base_frequency(&self) -> f32 {
        self.lock().base_frequency
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    pub fn resource(&self) -> Option<SoundResource> {
        self.lock().resource
    }

    /// Last channel handle; may be stale
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.lock().channel
    }
}

impl<E: AudioEngine + 'static> Drop for SoundPlayer<E> {
    fn drop(&mut self) {
        self.unload();
    }
}

fn lock_inner(inner: &Mutex<PlayerInner>) -> MutexGuard<'_, PlayerInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Waiter body: poll readiness, then start the routed channel
fn wait_and_play<E: AudioEngine>(
    session: &EngineSession<E>,
    inner: &Mutex<PlayerInner>,
    sound: SoundHandle,
    selector: &SpeakerSelector,
    cancel: &AtomicBool,
) -> PlayOutcome {
    let config = session.config();
    let deadline = Instant::now() + config.ready_timeout();

    loop {
        if cancel.load(Ordering::Acquire) {
            return PlayOutcome::Cancelled;
        }

        match session.engine().is_sound_ready(sound) {
            Ok(true) => break,
            Ok(false) => {}
            Err(EngineError::InvalidHandle) => return PlayOutcome::NotLoaded,
            Err(e) => debug!("Readiness check for {:?} failed: {}", sound, e),
        }

        if Instant::now() >= deadline {
            warn!(
                "Sound {:?} not ready after {:?}, giving up",
                sound,
                config.ready_timeout()
            );
            return PlayOutcome::TimedOut;
        }

        thread::sleep(config.ready_poll_interval());
    }

    let mut state = lock_inner(inner);
    if cancel.load(Ordering::Acquire) {
        return PlayOutcome::Cancelled;
    }
    if state.resource.map(|resource| resource.handle()) != Some(sound) {
        return PlayOutcome::NotLoaded;
    }

    match start_channel(session, &mut state, Some(selector)) {
        Ok(channel) => PlayOutcome::Started(channel),
        Err(e) => {
            warn!("Deferred routed playback failed: {}", e);
            PlayOutcome::Failed(e.to_string())
        }
    }
}
