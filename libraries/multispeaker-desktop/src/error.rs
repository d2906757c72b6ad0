//! Desktop engine errors

use multispeaker_core::EngineError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Backend not available on this system
    #[error("Audio backend '{0}' is not available")]
    BackendUnavailable(&'static str),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding failed
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CPAL error
    #[error("CPAL error: {0}")]
    CpalError(String),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::CpalError(err.to_string())
    }
}

impl From<cpal::DevicesError> for AudioError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => AudioError::Io(e),
            symphonia::core::errors::Error::Unsupported(what) => {
                AudioError::UnsupportedFormat(what.to_string())
            }
            other => AudioError::DecodeError(other.to_string()),
        }
    }
}

impl From<AudioError> for EngineError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound => EngineError::Device("audio device not found".to_string()),
            AudioError::DeviceError(msg)
            | AudioError::StreamBuildError(msg)
            | AudioError::PlayError(msg)
            | AudioError::CpalError(msg) => EngineError::Device(msg),
            AudioError::BackendUnavailable(name) => EngineError::BackendUnavailable(name.to_string()),
            AudioError::UnsupportedFormat(msg) => EngineError::UnsupportedFormat(msg),
            AudioError::DecodeError(msg) => EngineError::Decode(msg),
            AudioError::Io(e) => EngineError::Io(e),
        }
    }
}
