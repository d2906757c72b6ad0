//! Property-based tests for mixer gains and seeking

use multispeaker_core::types::TimeUnit;
use multispeaker_core::SpeakerMix;
use multispeaker_desktop::decoder::SoundData;
use multispeaker_desktop::mixer::{mix_levels, pan_levels, Mixer};
use proptest::prelude::*;
use std::sync::Arc;

fn silent(frames: usize, rate: u32) -> Arc<SoundData> {
    Arc::new(SoundData::new(vec![0.0; frames * 2], rate))
}

proptest! {
    #[test]
    fn prop_pan_levels_stay_in_unit_range(pan in -10.0f32..10.0) {
        let levels = pan_levels(pan);
        prop_assert_eq!(levels.len(), 2);
        for gain in levels.iter().flatten() {
            prop_assert!((0.0..=1.0).contains(gain), "gain out of range: {}", gain);
        }

        // Left input only reaches speaker 0, right input only speaker 1
        prop_assert_eq!(levels[0][1], 0.0);
        prop_assert_eq!(levels[1][0], 0.0);
    }

    #[test]
    fn prop_pan_keeps_one_side_at_full_gain(pan in -1.0f32..=1.0) {
        let levels = pan_levels(pan);
        prop_assert!(levels[0][0] == 1.0 || levels[1][1] == 1.0);
    }

    #[test]
    fn prop_mix_levels_stay_in_unit_range(gains in prop::array::uniform8(0.0f32..=1.0)) {
        let levels = mix_levels(&SpeakerMix(gains));
        prop_assert_eq!(levels.len(), 8);
        for (slot, level) in levels.iter().enumerate() {
            prop_assert!((0.0..=1.0).contains(&level[0]));
            prop_assert!((0.0..=1.0).contains(&level[1]));
            prop_assert!(level[0] + level[1] <= gains[slot] + 1e-6);
        }
    }

    #[test]
    fn prop_seek_then_position_clamps_to_last_frame(
        frames in 1usize..5000,
        target in 0u32..10_000,
    ) {
        let mut mixer = Mixer::new();
        mixer.configure(4, 2, 48000);
        let channel = mixer.play(1, silent(frames, 48000), true).unwrap();

        mixer.set_position(channel, target, TimeUnit::Pcm).unwrap();
        let expected = target.min(frames as u32 - 1);
        prop_assert_eq!(mixer.position(channel, TimeUnit::Pcm).unwrap(), expected);
    }

    #[test]
    fn prop_seek_in_ms_never_passes_the_end(
        frames in 1usize..48_000,
        target_ms in 0u32..5_000,
    ) {
        let mut mixer = Mixer::new();
        mixer.configure(4, 2, 48000);
        let channel = mixer.play(1, silent(frames, 44100), true).unwrap();

        mixer.set_position(channel, target_ms, TimeUnit::Ms).unwrap();
        let position = mixer.position(channel, TimeUnit::Pcm).unwrap();
        prop_assert!(position < frames as u32);
    }
}
