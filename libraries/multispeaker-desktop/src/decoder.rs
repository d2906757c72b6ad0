//! Sound decoding with Symphonia
//!
//! Every sound is decoded to interleaved stereo `f32` at its native sample
//! rate; mono sources are duplicated to both channels and extra channels
//! beyond the first two are dropped. The mixer resamples on the fly through
//! the channel frequency, so no resampler is involved here.

use crate::error::{AudioError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fully decoded sound
#[derive(Debug, Clone, PartialEq)]
pub struct SoundData {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
    /// Native sample rate (Hz)
    pub sample_rate: u32,
}

impl SoundData {
    /// Stereo sound from interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length in sample frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Stereo frame at `index`, silence past the end
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let i = index * 2;
        match (self.samples.get(i), self.samples.get(i + 1)) {
            (Some(&l), Some(&r)) => (l, r),
            _ => (0.0, 0.0),
        }
    }
}

/// Header information available before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame count if the container declares it
    pub frames: Option<u64>,
}

struct OpenedFile {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: SoundInfo,
}

fn open(path: &Path) -> Result<OpenedFile> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let reader = format.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::UnsupportedFormat("unknown sample rate".to_string()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let info = SoundInfo {
        sample_rate,
        channels,
        frames: track.codec_params.n_frames,
    };
    let track_id = track.id;

    let decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    Ok(OpenedFile {
        reader,
        decoder,
        track_id,
        info,
    })
}

/// Read header information without decoding
pub fn read_header(path: &Path) -> Result<SoundInfo> {
    open(path).map(|opened| opened.info)
}

/// Decode a whole file
pub fn decode_file(path: &Path) -> Result<SoundData> {
    decode_with_cancel(path, &AtomicBool::new(false))
}

/// Decode a whole file, stopping early when `cancel` is set
pub fn decode_with_cancel(path: &Path, cancel: &AtomicBool) -> Result<SoundData> {
    let OpenedFile {
        mut reader,
        mut decoder,
        track_id,
        info,
    } = open(path)?;

    let capacity = info.frames.map(|f| f as usize * 2).unwrap_or(0);
    let mut samples = Vec::with_capacity(capacity);

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(AudioError::DecodeError("decoding cancelled".to_string()));
        }

        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_stereo(decoded, &mut samples),
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet; skip it
                warn!("Skipping undecodable packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(
        "Decoded {} ({} frames @ {} Hz, {} source channels)",
        path.display(),
        samples.len() / 2,
        info.sample_rate,
        info.channels
    );

    Ok(SoundData::new(samples, info.sample_rate))
}

/// Append planar audio as interleaved stereo, duplicating mono
fn interleave_stereo<T, F>(
    buf: &symphonia::core::audio::AudioBuffer<T>,
    normalize: F,
    output: &mut Vec<f32>,
) where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }

    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };

    output.reserve(buf.frames() * 2);
    for (&l, &r) in left.iter().zip(right.iter()) {
        output.push(normalize(l));
        output.push(normalize(r));
    }
}

fn append_stereo(decoded: AudioBufferRef<'_>, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_stereo(&buf, |s| s, output),
        AudioBufferRef::F64(buf) => interleave_stereo(&buf, |s| s as f32, output),

        AudioBufferRef::S8(buf) => interleave_stereo(&buf, |s| s as f32 / i8::MAX as f32, output),
        AudioBufferRef::S16(buf) => {
            interleave_stereo(&buf, |s| s as f32 / i16::MAX as f32, output);
        }
        AudioBufferRef::S24(buf) => {
            interleave_stereo(&buf, |s| s.inner() as f32 / 8388607.0, output);
        }
        AudioBufferRef::S32(buf) => {
            interleave_stereo(&buf, |s| s as f32 / i32::MAX as f32, output);
        }

        AudioBufferRef::U8(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0, output);
        }
        AudioBufferRef::U16(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0, output);
        }
        AudioBufferRef::U24(buf) => {
            interleave_stereo(&buf, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0, output);
        }
        AudioBufferRef::U32(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0, output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_access() {
        let data = SoundData::new(vec![0.1, 0.2, 0.3, 0.4], 48000);
        assert_eq!(data.frames(), 2);
        assert_eq!(data.frame(1), (0.3, 0.4));
        assert_eq!(data.frame(2), (0.0, 0.0));
    }

    #[test]
    fn test_missing_file() {
        let result = decode_file(Path::new("/nonexistent/sound.wav"));
        assert!(matches!(result, Err(AudioError::Io(_))));
    }

    #[test]
    fn test_cancelled_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8000 {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();

        let result = decode_with_cancel(&path, &AtomicBool::new(true));
        assert!(matches!(result, Err(AudioError::DecodeError(_))));
    }
}
