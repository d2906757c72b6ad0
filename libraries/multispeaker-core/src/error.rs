//! Error types for the playback layer

use thiserror::Error;

/// Errors reported by an [`AudioEngine`](crate::AudioEngine) implementation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has not been created yet (or was closed)
    #[error("Audio engine not created")]
    NotCreated,

    /// The engine was created but its output has not been started
    #[error("Audio engine output not started")]
    NotStarted,

    /// Handle does not refer to a live sound, channel or group
    #[error("Invalid handle")]
    InvalidHandle,

    /// Every playback channel is in use
    #[error("No free playback channel")]
    NoFreeChannel,

    /// Sound is still being opened or decoded
    #[error("Sound not ready")]
    NotReady,

    /// Output backend cannot be used on this system
    #[error("Output backend '{0}' is not available")]
    BackendUnavailable(String),

    /// Requested format is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Device error
    #[error("Device error: {0}")]
    Device(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Hard failures of [`EngineSession::initialize`](crate::EngineSession::initialize)
#[derive(Debug, Error)]
pub enum SessionError {
    /// The engine connection could not be created
    #[error("Failed to create audio engine: {0}")]
    Create(#[source] EngineError),

    /// The engine was created but its output could not be started
    #[error("Failed to start audio engine: {0}")]
    Start(#[source] EngineError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
