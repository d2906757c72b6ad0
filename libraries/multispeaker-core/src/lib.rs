//! Multi-speaker playback layer
//!
//! Loads sounds, manages their playback channels and routes them to
//! arbitrary physical outputs on top of an abstract [`AudioEngine`].
//!
//! This crate provides:
//! - [`EngineSession`]: the shared engine connection (driver selection,
//!   ASIO negotiation, master volume, spectrum)
//! - [`SoundPlayer`]: per-sound load/play state machine with cached settings
//! - [`routing`]: legacy 4-way and indexed-pair speaker routing
//! - [`spectrum`]: band folding of engine spectrum data
//!
//! # Architecture
//!
//! `multispeaker-core` does no audio I/O. Engines implement [`AudioEngine`];
//! the desktop implementation lives in `multispeaker-desktop`. Tests use the
//! in-memory engine from `testing` (feature `test-utils`).
//!
//! # Example
//!
//! ```rust,no_run
//! use multispeaker_core::{AudioEngine, EngineSession, LegacySpeaker, SessionConfig, SoundPlayer};
//! use std::sync::Arc;
//!
//! fn ring<E: AudioEngine + 'static>(engine: E) {
//!     let config = SessionConfig::default();
//!     let session = Arc::new(EngineSession::new(engine, config));
//!
//!     let mut player = SoundPlayer::new(Arc::clone(&session));
//!     if player.load("sounds/bell.wav", false) {
//!         player.set_volume(0.8);
//!         player.play_to(LegacySpeaker::Back);
//!     }
//!
//!     // Once per frame
//!     session.update();
//!     let _bands = session.spectrum(32);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pending;
pub mod player;
pub mod routing;
pub mod session;
pub mod spectrum;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::SessionConfig;
pub use engine::AudioEngine;
pub use error::{ConfigError, EngineError, EngineResult, SessionError};
pub use pending::{PendingPlay, PlayOutcome};
pub use player::{PlayerState, SoundPlayer, SoundResource};
pub use routing::{LegacySpeaker, OutputSpeaker, SpeakerMix, SpeakerSelector};
pub use session::EngineSession;
pub use types::{
    ChannelGroupHandle, ChannelHandle, DriverInfo, DriverType, OutputBackend, SoundHandle,
};
