//! Multi-channel CPAL output running the mixer
//!
//! **Architecture**: a dedicated audio thread opens the device and owns the
//! CPAL `Stream` (which is not `Send` on every platform). The thread reports
//! the negotiated format back once the stream is playing, then parks until
//! the [`OutputStream`] handle is dropped.

use crate::device;
use crate::error::{AudioError, Result};
use crate::mixer::Mixer;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use multispeaker_core::types::SoftwareFormat;
use multispeaker_core::OutputBackend;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Format the device was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

/// What to open
#[derive(Debug, Clone, Copy)]
pub struct OutputRequest {
    pub backend: OutputBackend,
    pub driver_index: usize,
    /// Preferred rate and channel count; used when the device supports it
    pub preferred: Option<SoftwareFormat>,
}

/// Running output stream
pub struct OutputStream {
    info: StreamInfo,
    /// Dropping the sender wakes the audio thread to shut down
    shutdown_tx: Option<Sender<()>>,
    audio_thread: Option<JoinHandle<()>>,
}

impl OutputStream {
    /// Open the device and start pulling audio from `mixer`
    pub fn open(request: OutputRequest, mixer: Arc<Mutex<Mixer>>) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<StreamInfo>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let audio_thread = thread::Builder::new()
            .name("multispeaker-audio".to_string())
            .spawn(move || audio_thread_run(request, mixer, ready_tx, shutdown_rx))?;

        match ready_rx.recv() {
            Ok(Ok(info)) => Ok(Self {
                info,
                shutdown_tx: Some(shutdown_tx),
                audio_thread: Some(audio_thread),
            }),
            Ok(Err(e)) => {
                let _ = audio_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = audio_thread.join();
                Err(AudioError::DeviceError("audio thread exited".to_string()))
            }
        }
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                error!("Audio thread panicked");
            }
        }
    }
}

fn lock_mixer(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Audio thread main loop
fn audio_thread_run(
    request: OutputRequest,
    mixer: Arc<Mutex<Mixer>>,
    ready_tx: Sender<Result<StreamInfo>>,
    shutdown_rx: Receiver<()>,
) {
    let stream = match start_stream(request, mixer) {
        Ok((stream, info)) => {
            let _ = ready_tx.send(Ok(info));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Blocks until the handle is dropped
    let _ = shutdown_rx.recv();

    if let Err(e) = stream.pause() {
        debug!("Failed to pause stream on shutdown: {}", e);
    }
    drop(stream);
    debug!("Audio thread stopped");
}

fn start_stream(request: OutputRequest, mixer: Arc<Mutex<Mixer>>) -> Result<(Stream, StreamInfo)> {
    let device = device::output_device(request.backend, request.driver_index)?;
    let name = device::name_of(&device);

    let supported = choose_config(&device, request.preferred)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    let info = StreamInfo {
        sample_rate: config.sample_rate,
        channels: config.channels,
        sample_format,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
        SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer)?,
        other => {
            return Err(AudioError::UnsupportedFormat(format!(
                "device sample format {:?}",
                other
            )))
        }
    };
    stream.play()?;

    info!(
        "Opened '{}' on {}: {} Hz, {} channels, {:?}",
        name, request.backend, info.sample_rate, info.channels, info.sample_format
    );
    Ok((stream, info))
}

/// Preferred format if the device supports it, else the device default
fn choose_config(
    device: &cpal::Device,
    preferred: Option<SoftwareFormat>,
) -> Result<cpal::SupportedStreamConfig> {
    if let Some(format) = preferred {
        let rate = format.sample_rate;
        let matching = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceError(e.to_string()))?
            .find(|range| {
                range.channels() == format.output_channels
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            });

        match matching {
            Some(range) => return Ok(range.with_sample_rate(rate)),
            None => warn!(
                "Device does not support {} Hz / {} channels, using its default format",
                rate, format.output_channels
            ),
        }
    }

    Ok(device.default_output_config()?)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            lock_mixer(&mixer).render(&mut scratch);
            for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(sample);
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
