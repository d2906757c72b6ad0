//! Sound player state machine against the in-memory engine

mod common;

use common::{loaded_player, session, session_with};
use multispeaker_core::testing::{DEFAULT_FAKE_LENGTH, FAKE_SAMPLE_RATE};
use multispeaker_core::types::LoopMode;
use multispeaker_core::{
    DriverType, LegacySpeaker, OutputSpeaker, PlayerState, SessionConfig, SoundPlayer,
    SoundResource, SpeakerSelector,
};
use std::path::PathBuf;
use std::sync::Arc;

#[test]
fn test_load_initializes_session() {
    let session = session();
    assert!(!session.is_initialized());

    let player = loaded_player(&session, "sounds/bell.wav");

    assert!(session.is_initialized());
    assert!(player.is_loaded());
    assert!(!player.is_streaming());
    assert_eq!(player.length_samples(), DEFAULT_FAKE_LENGTH);
    assert_eq!(player.state(), PlayerState::Loaded);
    assert_eq!(player.loaded_path(), Some(PathBuf::from("sounds/bell.wav")));
    assert!(matches!(player.resource(), Some(SoundResource::Owned(_))));
}

#[test]
fn test_load_failure_leaves_player_unloaded() {
    let session = session();
    session.engine().fail_path("sounds/missing.wav");

    let mut player = SoundPlayer::new(Arc::clone(&session));
    assert!(!player.load("sounds/missing.wav", false));

    assert!(!player.is_loaded());
    assert_eq!(player.state(), PlayerState::Unloaded);
    assert_eq!(session.engine().live_sounds(), 0);

    // Retry with a good path
    assert!(player.load("sounds/bell.wav", false));
    assert!(player.is_loaded());
}

#[test]
fn test_load_fails_without_engine() {
    let session = session();
    session.engine().fail_create(true);

    let mut player = SoundPlayer::new(Arc::clone(&session));
    assert!(!player.load("sounds/bell.wav", false));
    assert!(!session.is_initialized());
    assert!(!player.is_loaded());
}

#[test]
fn test_failed_load_after_close_releases_previous_sound() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");
    assert_eq!(session.engine().live_sounds(), 1);

    session.close();
    session.engine().fail_create(true);

    assert!(!player.load("sounds/horn.wav", false));
    assert!(!player.is_loaded());
    assert_eq!(player.state(), PlayerState::Unloaded);
    assert_eq!(player.loaded_path(), None);
    assert_eq!(session.engine().live_sounds(), 0);
    assert_eq!(session.engine().double_releases(), 0);
}

#[test]
fn test_load_resets_multi_play() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_multi_play(true);
    assert!(player.is_multi_play());

    assert!(player.load("sounds/horn.wav", false));
    assert!(!player.is_multi_play());

    let sound = player.resource().unwrap().handle();
    player.play();
    player.play();
    assert_eq!(session.engine().playing_channels_of(sound), 1);
}

#[test]
fn test_reload_releases_previous_sound_once() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/a.wav");
    let first = player.resource().unwrap().handle();

    assert!(player.load("sounds/b.wav", false));
    let second = player.resource().unwrap().handle();
    assert_ne!(first, second);

    let engine = session.engine();
    assert_eq!(engine.release_count(first), 1);
    assert_eq!(engine.live_sounds(), 1);

    player.unload();
    player.unload();
    drop(player);

    assert_eq!(engine.release_count(first), 1);
    assert_eq!(engine.release_count(second), 1);
    assert_eq!(engine.double_releases(), 0);
    assert_eq!(engine.live_sounds(), 0);
}

#[test]
fn test_streaming_sound_left_to_engine() {
    let session = session();
    let mut player = SoundPlayer::new(Arc::clone(&session));
    assert!(player.load("music/ambience.ogg", true));

    assert!(player.is_streaming());
    let sound = player.resource().unwrap().handle();
    assert_eq!(player.resource(), Some(SoundResource::EngineManaged(sound)));

    player.unload();
    assert_eq!(session.engine().release_count(sound), 0);
    assert_eq!(session.engine().live_sounds(), 1);

    session.close();
    assert_eq!(session.engine().live_sounds(), 0);
}

#[test]
fn test_dropping_player_releases_sound() {
    let session = session();
    {
        let mut player = loaded_player(&session, "sounds/bell.wav");
        player.play();
        assert_eq!(session.engine().live_sounds(), 1);
    }
    assert_eq!(session.engine().live_sounds(), 0);
    assert_eq!(session.engine().playing_channels(), 0);
}

#[test]
fn test_play_applies_cached_state() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_volume(0.5);
    player.set_pan(2.0);
    player.set_speed(2.0);
    player.set_loop(true);
    player.play();

    let channel = player.channel().unwrap();
    let state = session.engine().channel(channel).unwrap();
    assert!(state.playing);
    assert!(!state.paused);
    assert_eq!(state.volume, 0.5);
    assert_eq!(state.pan, 1.0);
    assert_eq!(state.frequency, FAKE_SAMPLE_RATE * 2.0);
    assert_eq!(state.loop_mode, LoopMode::Normal);

    assert_eq!(player.pan(), 2.0);
    assert_eq!(player.base_frequency(), FAKE_SAMPLE_RATE);
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(session.engine().ticks() >= 1);
}

#[test]
fn test_play_forces_engine_tick() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    let before = session.engine().ticks();
    player.play();
    assert_eq!(session.engine().ticks(), before + 1);
}

#[test]
fn test_failed_play_still_ticks_engine() {
    let session = session_with(
        SessionConfig::new("Speakers", DriverType::Default).with_max_channels(2),
    );
    let mut player = loaded_player(&session, "sounds/bell.wav");
    let sound = player.resource().unwrap().handle();
    player.set_multi_play(true);

    player.play();
    let first = player.channel().unwrap();
    player.play();
    let second = player.channel().unwrap();
    assert_ne!(first, second);

    session.engine().finish_channel(first);
    session.engine().finish_channel(second);

    // Both slots are still held until the engine ticks, so this start fails
    let before = session.engine().ticks();
    player.play();
    assert_eq!(session.engine().ticks(), before + 1);
    assert_eq!(player.channel(), Some(second));

    player.play();
    let third = player.channel().unwrap();
    assert_ne!(third, second);
    assert!(player.is_playing());
    assert_eq!(session.engine().playing_channels_of(sound), 1);
}

#[test]
fn test_play_twice_keeps_single_channel() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");
    let sound = player.resource().unwrap().handle();

    player.play();
    let first = player.channel().unwrap();
    player.play();

    assert_eq!(session.engine().playing_channels_of(sound), 1);
    assert!(session.engine().channel(first).is_none());
}

#[test]
fn test_multi_play_overlaps_unless_looping() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");
    let sound = player.resource().unwrap().handle();

    player.set_multi_play(true);
    player.play();
    player.play();
    assert_eq!(session.engine().playing_channels_of(sound), 2);

    player.set_loop(true);
    player.play();
    assert_eq!(session.engine().playing_channels_of(sound), 2);
    assert!(player.is_multi_play());
}

#[test]
fn test_cached_pause_applies_on_play() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_paused(true);
    player.play();

    let channel = player.channel().unwrap();
    assert!(session.engine().channel(channel).unwrap().paused);
    assert_eq!(player.state(), PlayerState::Paused);
    assert!(player.is_playing());

    player.set_paused(false);
    assert!(!session.engine().channel(channel).unwrap().paused);
    assert_eq!(player.state(), PlayerState::Playing);
}

#[test]
fn test_play_to_routes_and_starts_unpaused() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_paused(true);
    player.set_pan(0.5);
    player.play_to(LegacySpeaker::Back);

    let channel = player.channel().unwrap();
    let state = session.engine().channel(channel).unwrap();
    assert_eq!(state.speaker_mix, Some(LegacySpeaker::Back.mix()));
    assert!(!state.paused);
    assert_eq!(state.pan, 0.0);
    assert!(!player.is_paused());
    assert_eq!(player.state(), PlayerState::Playing);
}

#[test]
fn test_play_to_indexed_pair() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_volume(0.9);
    player.play_to(SpeakerSelector::pair(
        OutputSpeaker::new(10),
        OutputSpeaker::new(11),
        [0.7, 0.3],
    ));

    let state = session.engine().channel(player.channel().unwrap()).unwrap();
    assert_eq!(state.speaker_levels.len(), 2);
    assert_eq!(state.speaker_levels[&10], vec![0.7, 0.0]);
    assert_eq!(state.speaker_levels[&11], vec![0.0, 0.3]);
    assert_eq!(state.speaker_mix, None);
    assert_eq!(state.volume, 0.9);
}

#[test]
fn test_play_to_speaker_index() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.play_to_speaker(1);
    let state = session.engine().channel(player.channel().unwrap()).unwrap();
    assert_eq!(state.speaker_mix, Some(LegacySpeaker::Side.mix()));

    // Unknown index plays with default placement
    player.play_to_speaker(9);
    let state = session.engine().channel(player.channel().unwrap()).unwrap();
    assert!(state.playing);
    assert_eq!(state.speaker_mix, None);
    assert!(state.speaker_levels.is_empty());
}

#[test]
fn test_setters_apply_live_only_while_playing() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.set_volume(0.3);
    assert_eq!(player.volume(), 0.3);
    assert!(player.channel().is_none());

    player.play();
    let channel = player.channel().unwrap();

    player.set_volume(0.6);
    player.set_pan(-3.0);
    player.set_speed(-1.0);
    player.set_loop(true);

    let state = session.engine().channel(channel).unwrap();
    assert_eq!(state.volume, 0.6);
    assert_eq!(state.pan, -1.0);
    assert_eq!(state.frequency, -FAKE_SAMPLE_RATE);
    assert_eq!(state.loop_mode, LoopMode::Normal);

    assert_eq!(player.pan(), -3.0);
    assert_eq!(player.speed(), -1.0);
    assert!(player.is_looping());
}

#[test]
fn test_finished_channel_is_not_touched() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.play();
    let channel = player.channel().unwrap();
    session.engine().finish_channel(channel);

    assert!(!player.is_playing());
    assert_eq!(player.state(), PlayerState::Loaded);

    player.set_volume(0.2);
    assert_eq!(session.engine().channel(channel).unwrap().volume, 1.0);
    assert_eq!(player.volume(), 0.2);

    session.update();
    assert!(session.engine().channel(channel).is_none());

    player.play();
    let state = session.engine().channel(player.channel().unwrap()).unwrap();
    assert_eq!(state.volume, 0.2);
}

#[test]
fn test_stop_returns_to_loaded() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.play();
    player.stop();

    assert_eq!(player.state(), PlayerState::Loaded);
    assert!(player.is_loaded());
    assert!(player.channel().is_none());
    assert_eq!(session.engine().playing_channels(), 0);

    player.stop();
    assert_eq!(player.state(), PlayerState::Loaded);
}

#[test]
fn test_unload_stops_playback() {
    let session = session();
    let mut player = loaded_player(&session, "sounds/bell.wav");

    player.play();
    player.unload();

    assert_eq!(player.state(), PlayerState::Unloaded);
    assert_eq!(player.loaded_path(), None);
    assert_eq!(player.length_samples(), 0);
    assert_eq!(session.engine().playing_channels(), 0);
}

#[test]
fn test_position_round_trip() {
    let session = session();
    session.engine().set_sound_length(1000);
    let mut player = loaded_player(&session, "sounds/bell.wav");

    // Not playing: ignored and reported as 0
    player.set_position(0.5);
    assert_eq!(player.position(), 0.0);
    assert_eq!(player.position_ms(), 0);

    player.play();
    let channel = player.channel().unwrap();

    player.set_position(0.25);
    assert_eq!(session.engine().channel(channel).unwrap().position_samples, 250);
    assert_eq!(player.position(), 0.25);

    player.set_position_ms(10);
    assert_eq!(session.engine().channel(channel).unwrap().position_samples, 441);
    assert_eq!(player.position_ms(), 10);
}

#[test]
fn test_position_with_zero_length() {
    let session = session();
    session.engine().set_sound_length(0);
    let mut player = loaded_player(&session, "sounds/empty.wav");

    player.play();
    assert!(player.is_playing());
    assert_eq!(player.position(), 0.0);
}

#[test]
fn test_play_without_load_does_nothing() {
    let session = session();
    let mut player = SoundPlayer::new(Arc::clone(&session));

    player.play();
    player.play_to(LegacySpeaker::Front);
    player.play_to_speaker(7);

    assert!(player.channel().is_none());
    assert!(!player.is_playing());
    assert_eq!(player.state(), PlayerState::Unloaded);
}

#[test]
fn test_stop_all_channels_and_master_volume() {
    let session = session();
    let mut first = loaded_player(&session, "sounds/a.wav");
    let mut second = loaded_player(&session, "sounds/b.wav");

    first.play();
    second.play_to(LegacySpeaker::Center);
    assert_eq!(session.engine().playing_channels(), 2);

    session.set_master_volume(0.4);
    assert_eq!(session.engine().master_volume(), 0.4);

    session.stop_all_channels();
    assert!(!first.is_playing());
    assert!(!second.is_playing());
    assert_eq!(first.state(), PlayerState::Loaded);
}
