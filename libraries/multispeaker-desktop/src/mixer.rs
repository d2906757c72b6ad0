//! Software voice mixer
//!
//! A fixed pool of voices, each playing one decoded stereo sound through a
//! per-speaker gain matrix. Logical speaker `i` is written to physical output
//! `speaker_map[i]` (identity when unset). Voices that reach their end stay in
//! the pool, reported as not playing, until [`Mixer::reclaim_finished`] runs
//! on the engine tick.
//!
//! Channel handles carry the slot index in the low 32 bits and the slot
//! generation in the high 32 bits, so a handle goes stale as soon as its
//! voice is stopped or reclaimed.

use crate::decoder::SoundData;
use multispeaker_core::{ChannelHandle, EngineError, EngineResult, SpeakerMix};
use multispeaker_core::types::{FftWindow, LoopMode, TimeUnit};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

/// Upper bound on addressable logical speakers
pub const MAX_SPEAKERS: usize = 32;

/// Mono history kept for spectrum analysis (two windows of the largest band count)
pub const HISTORY_LEN: usize = 16_384;

/// One playing sound
#[derive(Debug, Clone)]
pub struct Voice {
    sound_id: u64,
    data: Arc<SoundData>,
    /// Position in source frames
    position: f64,
    /// Playback frequency in Hz; negative plays backwards
    frequency: f32,
    volume: f32,
    paused: bool,
    looping: bool,
    playing: bool,
    /// Per logical speaker: gain of the left and right input
    levels: Vec<[f32; 2]>,
}

impl Voice {
    fn new(sound_id: u64, data: Arc<SoundData>, paused: bool) -> Self {
        let frequency = data.sample_rate as f32;
        Self {
            sound_id,
            data,
            position: 0.0,
            frequency,
            volume: 1.0,
            paused,
            looping: false,
            playing: true,
            levels: pan_levels(0.0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn levels(&self) -> &[[f32; 2]] {
        &self.levels
    }

    /// Position in whole source frames
    pub fn position_frames(&self) -> u32 {
        self.position.max(0.0) as u32
    }

    fn position_in(&self, unit: TimeUnit) -> u32 {
        let frames = self.position_frames();
        match unit {
            TimeUnit::Pcm => frames,
            TimeUnit::Ms => {
                (u64::from(frames) * 1000 / u64::from(self.data.sample_rate.max(1))) as u32
            }
        }
    }

    fn seek(&mut self, position: u32, unit: TimeUnit) {
        let frames = match unit {
            TimeUnit::Pcm => u64::from(position),
            TimeUnit::Ms => u64::from(position) * u64::from(self.data.sample_rate) / 1000,
        };
        let last = self.data.frames().saturating_sub(1) as u64;
        self.position = frames.min(last) as f64;
    }

    /// Interpolated stereo frame at the current position
    fn sample(&self) -> (f32, f32) {
        let index = self.position.floor();
        let frac = (self.position - index) as f32;
        let index = index as usize;

        let (l0, r0) = self.data.frame(index);
        let next = if self.looping && index + 1 >= self.data.frames() {
            0
        } else {
            index + 1
        };
        let (l1, r1) = self.data.frame(next);

        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }

    /// Move by `step` frames, wrapping or finishing at either end
    fn advance(&mut self, step: f64) {
        let frames = self.data.frames() as f64;
        self.position += step;

        if self.position >= frames || self.position < 0.0 {
            if self.looping && frames > 0.0 {
                self.position = self.position.rem_euclid(frames);
            } else {
                self.playing = false;
            }
        }
    }
}

/// Default stereo placement: left input to speaker 0, right to speaker 1
pub fn pan_levels(pan: f32) -> Vec<[f32; 2]> {
    let pan = pan.clamp(-1.0, 1.0);
    let left = (1.0 - pan).min(1.0);
    let right = (1.0 + pan).min(1.0);
    vec![[left, 0.0], [0.0, right]]
}

/// Speaker matrix for an 8-slot 7.1 mix
///
/// Left-side slots take the left input, right-side slots the right input,
/// center and LFE take half of each.
pub fn mix_levels(mix: &SpeakerMix) -> Vec<[f32; 2]> {
    mix.gains()
        .iter()
        .enumerate()
        .map(|(slot, &gain)| match slot {
            SpeakerMix::FRONT_LEFT | SpeakerMix::BACK_LEFT | SpeakerMix::SIDE_LEFT => [gain, 0.0],
            SpeakerMix::FRONT_RIGHT | SpeakerMix::BACK_RIGHT | SpeakerMix::SIDE_RIGHT => {
                [0.0, gain]
            }
            _ => [gain * 0.5, gain * 0.5],
        })
        .collect()
}

/// Voice pool and master bus
#[derive(Debug)]
pub struct Mixer {
    voices: Vec<Option<Voice>>,
    generations: Vec<u32>,
    output_channels: usize,
    output_rate: u32,
    speaker_map: Vec<usize>,
    master_volume: f32,
    history: VecDeque<f32>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    /// Unconfigured mixer; plays nothing until [`configure`](Self::configure)
    pub fn new() -> Self {
        Self {
            voices: Vec::new(),
            generations: Vec::new(),
            output_channels: 0,
            output_rate: 0,
            speaker_map: Vec::new(),
            master_volume: 1.0,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Size the voice pool and output format; drops every voice
    pub fn configure(&mut self, max_voices: usize, output_channels: usize, output_rate: u32) {
        self.voices = vec![None; max_voices];
        self.generations = vec![0; max_voices];
        self.output_channels = output_channels;
        self.output_rate = output_rate;
        self.history.clear();
    }

    /// Drop every voice and forget the output format
    pub fn reset(&mut self) {
        *self = Self {
            speaker_map: std::mem::take(&mut self.speaker_map),
            ..Self::new()
        };
    }

    pub fn is_configured(&self) -> bool {
        self.output_rate > 0 && !self.voices.is_empty()
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Physical output for each logical speaker
    pub fn set_speaker_map(&mut self, map: Vec<usize>) {
        self.speaker_map = map;
    }

    fn physical_output(&self, speaker: usize) -> usize {
        self.speaker_map.get(speaker).copied().unwrap_or(speaker)
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    fn handle(slot: usize, generation: u32) -> ChannelHandle {
        ChannelHandle::new((u64::from(generation) << 32) | slot as u64)
    }

    fn slot_of(&self, channel: ChannelHandle) -> EngineResult<usize> {
        let raw = channel.raw();
        let slot = (raw & 0xFFFF_FFFF) as usize;
        let generation = (raw >> 32) as u32;

        match (self.voices.get(slot), self.generations.get(slot)) {
            (Some(Some(_)), Some(&current)) if current == generation => Ok(slot),
            _ => Err(EngineError::InvalidHandle),
        }
    }

    fn free_slot(&mut self, slot: usize) {
        self.voices[slot] = None;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
    }

    /// Start a voice on a free slot
    pub fn play(
        &mut self,
        sound_id: u64,
        data: Arc<SoundData>,
        paused: bool,
    ) -> EngineResult<ChannelHandle> {
        if !self.is_configured() {
            return Err(EngineError::NotStarted);
        }

        let slot = self
            .voices
            .iter()
            .position(Option::is_none)
            .ok_or(EngineError::NoFreeChannel)?;

        self.voices[slot] = Some(Voice::new(sound_id, data, paused));
        Ok(Self::handle(slot, self.generations[slot]))
    }

    pub fn voice(&self, channel: ChannelHandle) -> EngineResult<&Voice> {
        let slot = self.slot_of(channel)?;
        self.voices[slot].as_ref().ok_or(EngineError::InvalidHandle)
    }

    fn voice_mut(&mut self, channel: ChannelHandle) -> EngineResult<&mut Voice> {
        let slot = self.slot_of(channel)?;
        self.voices[slot].as_mut().ok_or(EngineError::InvalidHandle)
    }

    pub fn stop(&mut self, channel: ChannelHandle) -> EngineResult<()> {
        let slot = self.slot_of(channel)?;
        self.free_slot(slot);
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for slot in 0..self.voices.len() {
            if self.voices[slot].is_some() {
                self.free_slot(slot);
            }
        }
    }

    /// Stop every voice playing `sound_id`
    pub fn stop_sound(&mut self, sound_id: u64) {
        for slot in 0..self.voices.len() {
            if matches!(&self.voices[slot], Some(v) if v.sound_id == sound_id) {
                self.free_slot(slot);
            }
        }
    }

    /// Free the slots of voices that reached their end
    pub fn reclaim_finished(&mut self) -> usize {
        let mut reclaimed = 0;
        for slot in 0..self.voices.len() {
            if matches!(&self.voices[slot], Some(v) if !v.playing) {
                self.free_slot(slot);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Voices still alive (playing or paused)
    pub fn active_voices(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| matches!(v, Some(voice) if voice.playing))
            .count()
    }

    pub fn is_playing(&self, channel: ChannelHandle) -> EngineResult<bool> {
        Ok(self.voice(channel)?.playing)
    }

    pub fn set_frequency(&mut self, channel: ChannelHandle, frequency: f32) -> EngineResult<()> {
        self.voice_mut(channel)?.frequency = frequency;
        Ok(())
    }

    pub fn set_volume(&mut self, channel: ChannelHandle, volume: f32) -> EngineResult<()> {
        self.voice_mut(channel)?.volume = volume;
        Ok(())
    }

    pub fn set_pan(&mut self, channel: ChannelHandle, pan: f32) -> EngineResult<()> {
        self.voice_mut(channel)?.levels = pan_levels(pan);
        Ok(())
    }

    pub fn set_paused(&mut self, channel: ChannelHandle, paused: bool) -> EngineResult<()> {
        self.voice_mut(channel)?.paused = paused;
        Ok(())
    }

    pub fn set_loop(&mut self, channel: ChannelHandle, mode: LoopMode) -> EngineResult<()> {
        self.voice_mut(channel)?.looping = mode == LoopMode::Normal;
        Ok(())
    }

    pub fn set_position(
        &mut self,
        channel: ChannelHandle,
        position: u32,
        unit: TimeUnit,
    ) -> EngineResult<()> {
        self.voice_mut(channel)?.seek(position, unit);
        Ok(())
    }

    pub fn position(&self, channel: ChannelHandle, unit: TimeUnit) -> EngineResult<u32> {
        Ok(self.voice(channel)?.position_in(unit))
    }

    pub fn set_speaker_mix(&mut self, channel: ChannelHandle, mix: &SpeakerMix) -> EngineResult<()> {
        self.voice_mut(channel)?.levels = mix_levels(mix);
        Ok(())
    }

    /// Set the input gains reaching one logical speaker
    ///
    /// `levels[0]` is the left input gain, `levels[1]` the right (0 when absent).
    pub fn set_speaker_levels(
        &mut self,
        channel: ChannelHandle,
        speaker: usize,
        levels: &[f32],
    ) -> EngineResult<()> {
        if speaker >= MAX_SPEAKERS {
            return Err(EngineError::Other(format!(
                "speaker {} out of range (max {})",
                speaker, MAX_SPEAKERS
            )));
        }

        let voice = self.voice_mut(channel)?;
        if voice.levels.len() <= speaker {
            voice.levels.resize(speaker + 1, [0.0, 0.0]);
        }
        voice.levels[speaker] = [
            levels.first().copied().unwrap_or(0.0),
            levels.get(1).copied().unwrap_or(0.0),
        ];
        Ok(())
    }

    /// Mix every active voice into interleaved `output`
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(0.0);

        let channels = self.output_channels;
        if channels == 0 || self.output_rate == 0 {
            return;
        }

        let output_rate = f64::from(self.output_rate);
        let master = self.master_volume;
        let outputs: Vec<usize> = (0..MAX_SPEAKERS).map(|s| self.physical_output(s)).collect();

        for voice in self.voices.iter_mut().flatten() {
            if !voice.playing || voice.paused {
                continue;
            }

            let step = f64::from(voice.frequency) / output_rate;
            let gain = voice.volume * master;

            for frame in output.chunks_exact_mut(channels) {
                if !voice.playing {
                    break;
                }

                let (left, right) = voice.sample();
                for (speaker, level) in voice.levels.iter().enumerate() {
                    let physical = outputs[speaker];
                    if physical < channels {
                        frame[physical] += (left * level[0] + right * level[1]) * gain;
                    }
                }

                voice.advance(step);
            }
        }

        for frame in output.chunks_exact(channels) {
            if self.history.len() == HISTORY_LEN {
                self.history.pop_front();
            }
            self.history.push_back(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    /// The last `count` samples of the master mix, zero-padded at the front
    pub fn recent_samples(&self, count: usize) -> Vec<f32> {
        let available = self.history.len().min(count);
        let mut samples = vec![0.0f32; count];
        for (slot, &sample) in samples[count - available..]
            .iter_mut()
            .zip(self.history.iter().skip(self.history.len() - available))
        {
            *slot = sample;
        }
        samples
    }

    /// Magnitudes of the recent master mix in `bands` linear bins
    pub fn spectrum(&self, bands: usize, window: FftWindow) -> Vec<f32> {
        analyze_spectrum(&self.recent_samples(bands * 2), bands, window)
    }
}

/// Magnitudes of `samples` in `bands` linear bins
///
/// Uses an FFT of `2 * bands` points over the tail of `samples` (zero-padded
/// at the front when short); a full-scale sine peaks near 1.
pub fn analyze_spectrum(samples: &[f32], bands: usize, window: FftWindow) -> Vec<f32> {
    if bands == 0 {
        return Vec::new();
    }

    let size = bands * 2;
    let available = samples.len().min(size);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); size];
    for (slot, &sample) in buffer[size - available..]
        .iter_mut()
        .zip(&samples[samples.len() - available..])
    {
        slot.re = sample;
    }

    let coefficients = window_coefficients(size, window);
    let gain_sum: f32 = coefficients.iter().sum();
    for (slot, w) in buffer.iter_mut().zip(&coefficients) {
        slot.re *= w;
    }

    let mut planner = FftPlanner::<f32>::new();
    planner.plan_fft_forward(size).process(&mut buffer);

    let scale = if gain_sum > 0.0 { 2.0 / gain_sum } else { 0.0 };
    buffer[..bands]
        .iter()
        .map(|c| (c.norm() * scale).clamp(0.0, 1.0))
        .collect()
}

fn window_coefficients(size: usize, window: FftWindow) -> Vec<f32> {
    match window {
        FftWindow::Rectangular => vec![1.0; size],
        FftWindow::Hann if size > 1 => (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
            .collect(),
        FftWindow::Hann => vec![1.0; size],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multispeaker_core::LegacySpeaker;

    fn constant(frames: usize, left: f32, right: f32, rate: u32) -> Arc<SoundData> {
        let samples = (0..frames).flat_map(|_| [left, right]).collect();
        Arc::new(SoundData::new(samples, rate))
    }

    fn mixer(voices: usize, channels: usize) -> Mixer {
        let mut mixer = Mixer::new();
        mixer.configure(voices, channels, 48000);
        mixer
    }

    #[test]
    fn test_play_requires_configuration() {
        let mut mixer = Mixer::new();
        let result = mixer.play(1, constant(4, 0.0, 0.0, 48000), false);
        assert!(matches!(result, Err(EngineError::NotStarted)));
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut mixer = mixer(2, 2);
        let data = constant(4, 0.0, 0.0, 48000);
        mixer.play(1, Arc::clone(&data), false).unwrap();
        mixer.play(1, Arc::clone(&data), false).unwrap();
        assert!(matches!(
            mixer.play(1, data, false),
            Err(EngineError::NoFreeChannel)
        ));
    }

    #[test]
    fn test_stopped_handle_goes_stale() {
        let mut mixer = mixer(1, 2);
        let data = constant(4, 0.0, 0.0, 48000);
        let first = mixer.play(1, Arc::clone(&data), false).unwrap();
        mixer.stop(first).unwrap();

        let second = mixer.play(1, data, false).unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            mixer.set_volume(first, 0.5),
            Err(EngineError::InvalidHandle)
        ));
        assert!(mixer.set_volume(second, 0.5).is_ok());
    }

    #[test]
    fn test_finished_voice_reclaimed_only_on_tick() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(4, 0.5, 0.5, 48000), false).unwrap();

        let mut out = vec![0.0; 16];
        mixer.render(&mut out);

        assert!(!mixer.is_playing(channel).unwrap());
        assert!(matches!(
            mixer.play(1, constant(4, 0.0, 0.0, 48000), false),
            Err(EngineError::NoFreeChannel)
        ));

        assert_eq!(mixer.reclaim_finished(), 1);
        assert!(mixer.is_playing(channel).is_err());
    }

    #[test]
    fn test_pan_levels() {
        assert_eq!(pan_levels(0.0), vec![[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(pan_levels(-1.0), vec![[1.0, 0.0], [0.0, 0.0]]);
        assert_eq!(pan_levels(0.5), vec![[0.5, 0.0], [0.0, 1.0]]);
        assert_eq!(pan_levels(7.0), pan_levels(1.0));
    }

    #[test]
    fn test_mix_levels_for_legacy_speakers() {
        let back = mix_levels(&LegacySpeaker::Back.mix());
        assert_eq!(back[SpeakerMix::BACK_LEFT], [1.0, 0.0]);
        assert_eq!(back[SpeakerMix::BACK_RIGHT], [0.0, 1.0]);
        assert_eq!(back[SpeakerMix::FRONT_LEFT], [0.0, 0.0]);

        let center = mix_levels(&LegacySpeaker::Center.mix());
        assert_eq!(center[SpeakerMix::CENTER], [0.5, 0.5]);
    }

    #[test]
    fn test_render_default_placement() {
        let mut mixer = mixer(4, 4);
        mixer.play(1, constant(8, 0.5, 0.25, 48000), false).unwrap();

        let mut out = vec![0.0; 8];
        mixer.render(&mut out);

        assert_eq!(&out[..4], &[0.5, 0.25, 0.0, 0.0]);
        assert_eq!(&out[4..], &[0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_render_indexed_speakers_through_map() {
        let mut mixer = mixer(4, 6);
        mixer.set_speaker_map(vec![0, 1, 2, 3, 5, 4]);
        let channel = mixer.play(1, constant(8, 0.5, 0.25, 48000), false).unwrap();

        // Route only to logical speakers 4 and 5
        mixer.set_speaker_levels(channel, 0, &[0.0, 0.0]).unwrap();
        mixer.set_speaker_levels(channel, 1, &[0.0, 0.0]).unwrap();
        mixer.set_speaker_levels(channel, 4, &[1.0, 0.0]).unwrap();
        mixer.set_speaker_levels(channel, 5, &[0.0, 1.0]).unwrap();

        let mut out = vec![0.0; 6];
        mixer.render(&mut out);

        // Logical 4 lands on physical 5, logical 5 on physical 4
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.5]);
    }

    #[test]
    fn test_speaker_out_of_range() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(4, 0.0, 0.0, 48000), false).unwrap();
        assert!(mixer
            .set_speaker_levels(channel, MAX_SPEAKERS, &[1.0, 1.0])
            .is_err());
    }

    #[test]
    fn test_paused_voice_is_silent_and_holds_position() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(8, 1.0, 1.0, 48000), true).unwrap();

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(mixer.position(channel, TimeUnit::Pcm).unwrap(), 0);
    }

    #[test]
    fn test_volume_and_master() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(8, 1.0, 1.0, 48000), false).unwrap();
        mixer.set_volume(channel, 0.5).unwrap();
        mixer.set_master_volume(0.5);

        let mut out = vec![0.0; 2];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.25, 0.25]);
    }

    #[test]
    fn test_reverse_playback_finishes_at_start() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(100, 0.1, 0.1, 48000), false).unwrap();
        mixer.set_position(channel, 2, TimeUnit::Pcm).unwrap();
        mixer.set_frequency(channel, -48000.0).unwrap();

        let mut out = vec![0.0; 2 * 4];
        mixer.render(&mut out);
        assert!(!mixer.is_playing(channel).unwrap());
    }

    #[test]
    fn test_loop_wraps() {
        let mut mixer = mixer(1, 2);
        let channel = mixer.play(1, constant(4, 0.1, 0.1, 48000), false).unwrap();
        mixer.set_loop(channel, LoopMode::Normal).unwrap();

        let mut out = vec![0.0; 2 * 10];
        mixer.render(&mut out);

        assert!(mixer.is_playing(channel).unwrap());
        assert_eq!(mixer.position(channel, TimeUnit::Pcm).unwrap(), 2);
    }

    #[test]
    fn test_position_in_ms() {
        let mut mixer = mixer(1, 2);
        let channel = mixer
            .play(1, constant(48000, 0.0, 0.0, 48000), false)
            .unwrap();
        mixer.set_position(channel, 500, TimeUnit::Ms).unwrap();
        assert_eq!(mixer.position(channel, TimeUnit::Pcm).unwrap(), 24000);
        assert_eq!(mixer.position(channel, TimeUnit::Ms).unwrap(), 500);
    }

    #[test]
    fn test_stop_sound_stops_its_voices() {
        let mut mixer = mixer(3, 2);
        let a = mixer.play(1, constant(4, 0.0, 0.0, 48000), false).unwrap();
        let b = mixer.play(2, constant(4, 0.0, 0.0, 48000), false).unwrap();

        mixer.stop_sound(1);
        assert!(mixer.voice(a).is_err());
        assert!(mixer.voice(b).is_ok());
    }

    #[test]
    fn test_spectrum_peak_of_sine() {
        let mut mixer = mixer(1, 1);
        let bands = 64;
        let bin = 8;
        let rate = 48000;
        let freq = bin as f32 * rate as f32 / (2 * bands) as f32;

        let samples: Vec<f32> = (0..4096)
            .flat_map(|i| {
                let s = (2.0 * PI * freq * i as f32 / rate as f32).sin();
                [s, s]
            })
            .collect();
        let channel = mixer
            .play(1, Arc::new(SoundData::new(samples, rate)), false)
            .unwrap();
        mixer.set_speaker_levels(channel, 0, &[1.0, 0.0]).unwrap();

        let mut out = vec![0.0; 1024];
        mixer.render(&mut out);

        let spectrum = mixer.spectrum(bands, FftWindow::Hann);
        assert_eq!(spectrum.len(), bands);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
        assert!(spectrum[bin] > 0.8, "peak {} too low", spectrum[bin]);
        assert!(spectrum.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn test_recent_samples_pad_front() {
        let mut mixer = mixer(1, 1);
        let channel = mixer
            .play(1, constant(4, 0.5, 0.5, 48000), false)
            .unwrap();
        mixer.set_speaker_levels(channel, 0, &[1.0, 0.0]).unwrap();

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);

        let recent = mixer.recent_samples(6);
        assert_eq!(&recent[..2], &[0.0, 0.0]);
        assert_eq!(&recent[2..], &out[..]);
        assert!(recent[2..].iter().all(|&s| s > 0.0));
        assert_eq!(mixer.recent_samples(2), &out[2..]);
    }

    #[test]
    fn test_analyze_spectrum_uses_tail_only() {
        let tail: Vec<f32> = (0..128).map(|i| (i as f32 * 0.3).sin()).collect();
        let mut long = vec![0.9f32; 300];
        long.extend_from_slice(&tail);

        assert_eq!(
            analyze_spectrum(&long, 64, FftWindow::Hann),
            analyze_spectrum(&tail, 64, FftWindow::Hann)
        );
        assert!(analyze_spectrum(&tail, 0, FftWindow::Hann).is_empty());
    }

    #[test]
    fn test_spectrum_of_silence() {
        let mixer = mixer(1, 2);
        let spectrum = mixer.spectrum(128, FftWindow::Hann);
        assert_eq!(spectrum.len(), 128);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }
}
