#![allow(dead_code)]

use multispeaker_core::testing::FakeEngine;
use multispeaker_core::{DriverType, EngineSession, SessionConfig, SoundPlayer};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Session on a fake engine with a few named drivers
pub fn session_with(config: SessionConfig) -> Arc<EngineSession<FakeEngine>> {
    init_logging();
    let engine = FakeEngine::with_drivers(&["Speakers", "Dante Virtual Soundcard", "ASIO4ALL v2"]);
    Arc::new(EngineSession::new(engine, config))
}

pub fn session() -> Arc<EngineSession<FakeEngine>> {
    session_with(SessionConfig::new("Speakers", DriverType::Default).with_ready_wait(2, 500))
}

/// Player with `path` already loaded
pub fn loaded_player(
    session: &Arc<EngineSession<FakeEngine>>,
    path: &str,
) -> SoundPlayer<FakeEngine> {
    let mut player = SoundPlayer::new(Arc::clone(session));
    assert!(player.load(path, false), "failed to load {}", path);
    player
}
