//! Engine session
//!
//! One session owns the connection to the audio hardware and is shared by
//! every [`SoundPlayer`](crate::SoundPlayer) through an `Arc`. Initialization
//! is lazy and idempotent; driver and backend negotiation is best-effort, so
//! a session degrades to whatever the hardware accepted instead of failing.

use crate::config::SessionConfig;
use crate::engine::AudioEngine;
use crate::error::SessionError;
use crate::spectrum;
use crate::types::{
    AdvancedSettings, ChannelGroupHandle, DriverInfo, DriverType, OutputBackend, SpeakerMode,
};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Mutable session state
#[derive(Debug, Default)]
struct SessionState {
    initialized: bool,
    master_group: Option<ChannelGroupHandle>,
    driver_index: usize,
    accepted_backend: Option<OutputBackend>,
}

/// Shared connection to the audio engine
pub struct EngineSession<E: AudioEngine> {
    engine: E,
    config: SessionConfig,
    state: Mutex<SessionState>,
}

impl<E: AudioEngine> EngineSession<E> {
    /// Create an uninitialized session
    pub fn new(engine: E, config: SessionConfig) -> Self {
        Self {
            engine,
            config,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the engine connection is up
    pub fn is_initialized(&self) -> bool {
        self.lock_state().initialized
    }

    /// Index of the driver selected during initialization
    pub fn selected_driver(&self) -> Option<usize> {
        let state = self.lock_state();
        state.initialized.then_some(state.driver_index)
    }

    /// Output backend the engine ended up on
    pub fn accepted_backend(&self) -> Option<OutputBackend> {
        self.lock_state().accepted_backend
    }

    /// Master channel group, once initialized
    pub fn master_group(&self) -> Option<ChannelGroupHandle> {
        self.lock_state().master_group
    }

    /// Bring up the engine connection
    ///
    /// Calling this on an initialized session does nothing. Only engine
    /// creation and start are hard failures; everything else is logged and
    /// skipped.
    pub fn initialize(&self) -> Result<(), SessionError> {
        let mut state = self.lock_state();
        if state.initialized {
            return Ok(());
        }

        self.engine.create().map_err(SessionError::Create)?;

        let drivers = match self.engine.drivers() {
            Ok(drivers) => drivers,
            Err(e) => {
                warn!("Failed to enumerate drivers: {}", e);
                Vec::new()
            }
        };
        info!("Number of drivers: {}", drivers.len());
        for driver in &drivers {
            info!("Device index: {}  device name: {}", driver.index, driver.name);
        }

        let driver_index = self.pick_driver(&drivers);
        if let Err(e) = self.engine.select_driver(driver_index) {
            warn!("Failed to select driver {}: {}", driver_index, e);
        }

        if let Err(e) = self.engine.set_speaker_mode(SpeakerMode::Raw) {
            info!("Set raw speaker mode failed: {}", e);
        }

        let mut backend = OutputBackend::Default;
        if self.config.driver == DriverType::Asio {
            match self.engine.set_output_backend(OutputBackend::Asio) {
                Ok(()) => {
                    info!("Set ASIO done");
                    backend = OutputBackend::Asio;
                }
                Err(e) => info!("Set ASIO failed: {}", e),
            }

            match self.engine.set_software_format(self.config.software_format) {
                Ok(()) => info!("Set software format done: {:?}", self.config.software_format),
                Err(e) => info!("Set software format failed: {}", e),
            }
        }

        let master_group = match self.engine.start(self.config.max_channels) {
            Ok(group) => group,
            Err(e) => {
                if let Err(close_err) = self.engine.close() {
                    debug!("Close after failed start: {}", close_err);
                }
                return Err(SessionError::Start(e));
            }
        };

        if self.config.driver == DriverType::Asio {
            self.negotiate_asio_channels();
        }

        *state = SessionState {
            initialized: true,
            master_group: Some(master_group),
            driver_index,
            accepted_backend: Some(backend),
        };

        info!(
            "Audio engine initialized on driver {} ({})",
            driver_index, backend
        );
        Ok(())
    }

    /// Driver whose name matches the configured device, else driver 0
    fn pick_driver(&self, drivers: &[DriverInfo]) -> usize {
        if let Some(driver) = drivers.iter().find(|d| d.name == self.config.device_name) {
            return driver.index;
        }

        warn!(
            "Audio device '{}' not found, falling back to driver 0",
            self.config.device_name
        );
        0
    }

    /// Explicit speaker list so every ASIO output is addressable
    fn negotiate_asio_channels(&self) {
        let mut settings = match self.engine.advanced_settings() {
            Ok(settings) => {
                info!("Get advanced settings done");
                settings
            }
            Err(e) => {
                info!("Get advanced settings failed: {}", e);
                AdvancedSettings::default()
            }
        };

        let wanted = AdvancedSettings::identity(self.config.asio_channel_count);
        settings.asio_channel_count = wanted.asio_channel_count;
        settings.asio_speaker_list = wanted.asio_speaker_list;

        match self.engine.set_advanced_settings(&settings) {
            Ok(()) => info!(
                "Set advanced settings done: {} ASIO channels",
                settings.asio_channel_count
            ),
            Err(e) => info!("Set advanced settings failed: {}", e),
        }
    }

    /// Initialize, logging a failure instead of returning it
    ///
    /// Used by operations that implicitly bring the engine up.
    pub fn ensure_initialized(&self) -> bool {
        match self.initialize() {
            Ok(()) => true,
            Err(e) => {
                warn!("Audio engine unavailable: {}", e);
                false
            }
        }
    }

    /// Tear down the engine connection; no-op when not initialized
    pub fn close(&self) {
        let mut state = self.lock_state();
        if !state.initialized {
            return;
        }

        if let Err(e) = self.engine.close() {
            warn!("Failed to close audio engine: {}", e);
        }

        *state = SessionState::default();
        info!("Audio engine closed");
    }

    /// Stop every channel of every player
    pub fn stop_all_channels(&self) {
        if !self.ensure_initialized() {
            return;
        }

        if let Some(group) = self.master_group() {
            if let Err(e) = self.engine.stop_group(group) {
                warn!("Failed to stop all channels: {}", e);
            }
        }
    }

    /// Set the master volume
    pub fn set_master_volume(&self, volume: f32) {
        if !self.ensure_initialized() {
            return;
        }

        if let Some(group) = self.master_group() {
            if let Err(e) = self.engine.set_group_volume(group, volume) {
                warn!("Failed to set master volume: {}", e);
            }
        }
    }

    /// Engine tick; should run once per frame
    pub fn update(&self) {
        if !self.is_initialized() {
            return;
        }

        if let Err(e) = self.engine.update() {
            debug!("Engine update failed: {}", e);
        }
    }

    /// Spectrum of the master mix remapped to `bands` values in [0, 1]
    ///
    /// See [`spectrum::analyze`] for the band-count rules.
    pub fn spectrum(&self, bands: i32) -> Vec<f32> {
        if !self.ensure_initialized() {
            return vec![0.0; bands.clamp(1, spectrum::MAX_SPECTRUM_BANDS as i32) as usize];
        }
        spectrum::analyze(&self.engine, bands)
    }
}
