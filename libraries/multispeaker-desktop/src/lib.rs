//! Desktop audio engine for multispeaker playback
//!
//! This crate provides [`CpalEngine`], an implementation of the
//! `multispeaker_core::AudioEngine` trait on top of CPAL (device output) and
//! Symphonia (decoding).
//!
//! # Features
//!
//! - Output on the platform default host, or ASIO on Windows (`asio` feature)
//! - Up to 32 logical speakers, mapped onto device channels through the
//!   engine's advanced speaker list
//! - Static sounds decoded at load, streaming sounds decoded in the background
//! - Per-channel volume, pan, frequency, looping, seeking and speaker levels
//! - Spectrum analysis of the mixed output
//!
//! # Example
//!
//! ```no_run
//! use multispeaker_core::{DriverType, EngineSession, SessionConfig, SoundPlayer};
//! use multispeaker_desktop::CpalEngine;
//! use std::sync::Arc;
//!
//! let config = SessionConfig::new("Speakers", DriverType::Default);
//! let session = Arc::new(EngineSession::new(CpalEngine::new(), config));
//!
//! let mut player = SoundPlayer::new(Arc::clone(&session));
//! if player.load("sounds/bell.wav", false) {
//!     player.play_to_speaker(2);
//! }
//! ```

#![deny(unsafe_code)]

pub mod backend;
pub mod decoder;
pub mod device;
mod engine;
mod error;
pub mod mixer;
pub mod output;

pub use engine::CpalEngine;
pub use error::{AudioError, Result};
