// multispeaker-desktop/src/backend.rs
//
// Output backend to CPAL host mapping (system default, ASIO)

use crate::error::{AudioError, Result};
use multispeaker_core::OutputBackend;

/// CPAL host for an output backend
///
/// ASIO is only available on Windows builds with the `asio` feature.
pub fn host_for(backend: OutputBackend) -> Result<cpal::Host> {
    match backend {
        OutputBackend::Default => Ok(cpal::default_host()),

        #[cfg(all(target_os = "windows", feature = "asio"))]
        OutputBackend::Asio => cpal::host_from_id(cpal::HostId::Asio)
            .map_err(|_| AudioError::BackendUnavailable(backend.name())),

        #[cfg(not(all(target_os = "windows", feature = "asio")))]
        OutputBackend::Asio => Err(AudioError::BackendUnavailable(backend.name())),
    }
}

/// Check if a backend can be used on this system
pub fn is_available(backend: OutputBackend) -> bool {
    host_for(backend).is_ok()
}

/// Name of the platform mixer behind [`OutputBackend::Default`]
pub fn default_backend_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "WASAPI";

    #[cfg(target_os = "macos")]
    return "CoreAudio";

    #[cfg(target_os = "linux")]
    return "ALSA";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "Default";
}

/// Backends usable on this system
pub fn list_available_backends() -> Vec<OutputBackend> {
    [OutputBackend::Default, OutputBackend::Asio]
        .into_iter()
        .filter(|backend| is_available(*backend))
        .collect()
}
