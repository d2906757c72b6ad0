// multispeaker-desktop/src/device.rs
//
// Output device enumeration and lookup by driver index

use cpal::traits::{DeviceTrait, HostTrait};
use multispeaker_core::{DriverInfo, OutputBackend};
use tracing::warn;

use crate::backend::host_for;
use crate::error::{AudioError, Result};

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string())
}

/// Enumerate output devices of a backend in host order
pub fn list_output_devices(backend: OutputBackend) -> Result<Vec<DriverInfo>> {
    let host = host_for(backend)?;
    let devices = host.output_devices()?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| DriverInfo {
            index,
            name: device_name(&device),
        })
        .collect())
}

/// Output device at `index`, falling back to the backend's default device
pub fn output_device(backend: OutputBackend, index: usize) -> Result<cpal::Device> {
    let host = host_for(backend)?;

    if let Some(device) = host.output_devices()?.nth(index) {
        return Ok(device);
    }

    warn!(
        "No output device at index {} on {}, using default device",
        index, backend
    );
    host.default_output_device()
        .ok_or(AudioError::DeviceNotFound)
}

/// Display name of a device
pub fn name_of(device: &cpal::Device) -> String {
    device_name(device)
}
