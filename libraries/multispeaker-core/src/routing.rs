//! Speaker routing
//!
//! Two independent selector forms:
//!
//! - **Legacy 4-way** ([`LegacySpeaker`]): a fixed unit-gain pair (or single
//!   center slot) inside the 8-speaker 7.1 layout. Works on consumer drivers.
//! - **Indexed pair** ([`SpeakerSelector::Pair`]): left and right input
//!   channels sent to any two of up to 16 physical outputs with explicit
//!   caller gains. Intended for ASIO interfaces.
//!
//! Legacy selections always use unit gain; pair selections use the caller's
//! gains.

use crate::engine::AudioEngine;
use crate::types::ChannelHandle;
use std::fmt;
use tracing::{debug, warn};

/// Number of addressable physical outputs for indexed routing
pub const MAX_OUTPUT_SPEAKERS: u8 = 16;

/// Gain per speaker of the 7.1 layout
///
/// Slot order: front-left, front-right, center, LFE, back-left, back-right,
/// side-left, side-right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpeakerMix(pub [f32; 8]);

impl SpeakerMix {
    /// Slot of the front-left speaker
    pub const FRONT_LEFT: usize = 0;
    /// Slot of the front-right speaker
    pub const FRONT_RIGHT: usize = 1;
    /// Slot of the center speaker
    pub const CENTER: usize = 2;
    /// Slot of the LFE channel
    pub const LFE: usize = 3;
    /// Slot of the back-left speaker
    pub const BACK_LEFT: usize = 4;
    /// Slot of the back-right speaker
    pub const BACK_RIGHT: usize = 5;
    /// Slot of the side-left speaker
    pub const SIDE_LEFT: usize = 6;
    /// Slot of the side-right speaker
    pub const SIDE_RIGHT: usize = 7;

    /// Mix with unit gain on `slots` and silence elsewhere
    pub fn unit(slots: &[usize]) -> Self {
        let mut gains = [0.0; 8];
        for &slot in slots {
            gains[slot] = 1.0;
        }
        Self(gains)
    }

    /// Gains as a slice
    pub fn gains(&self) -> &[f32; 8] {
        &self.0
    }
}

/// Legacy 4-way output selection for 7.1 setups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacySpeaker {
    /// Back pair
    Back,
    /// Side pair
    Side,
    /// Front pair
    Front,
    /// Center speaker
    Center,
}

impl LegacySpeaker {
    /// Fixed speaker mix for this selection
    pub fn mix(self) -> SpeakerMix {
        match self {
            Self::Back => SpeakerMix::unit(&[SpeakerMix::BACK_LEFT, SpeakerMix::BACK_RIGHT]),
            Self::Side => SpeakerMix::unit(&[SpeakerMix::SIDE_LEFT, SpeakerMix::SIDE_RIGHT]),
            Self::Front => SpeakerMix::unit(&[SpeakerMix::FRONT_LEFT, SpeakerMix::FRONT_RIGHT]),
            Self::Center => SpeakerMix::unit(&[SpeakerMix::CENTER]),
        }
    }

    /// Legacy integer index (0 back, 1 side, 2 front, 3 center)
    pub fn index(self) -> i32 {
        match self {
            Self::Back => 0,
            Self::Side => 1,
            Self::Front => 2,
            Self::Center => 3,
        }
    }
}

impl TryFrom<i32> for LegacySpeaker {
    type Error = i32;

    fn try_from(index: i32) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::Back),
            1 => Ok(Self::Side),
            2 => Ok(Self::Front),
            3 => Ok(Self::Center),
            other => Err(other),
        }
    }
}

/// Physical output speaker, 0..=15
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputSpeaker(u8);

impl OutputSpeaker {
    /// Output `index`, or `None` when it is not below [`MAX_OUTPUT_SPEAKERS`]
    pub fn new(index: u8) -> Option<Self> {
        (index < MAX_OUTPUT_SPEAKERS).then_some(Self(index))
    }

    /// Output index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Speaker from a signed index where any negative value means "none"
    pub fn from_signed(index: i32) -> Option<Self> {
        u8::try_from(index).ok().and_then(Self::new)
    }
}

impl fmt::Display for OutputSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker {}", self.0 + 1)
    }
}

/// Where a channel's audio goes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeakerSelector {
    /// Legacy 4-way selection
    Legacy(LegacySpeaker),

    /// Left input to `left`, right input to `right`, each with its own gain.
    /// A `None` side is skipped and leaves that output untouched.
    Pair {
        /// Output receiving the left input channel
        left: Option<OutputSpeaker>,
        /// Output receiving the right input channel
        right: Option<OutputSpeaker>,
        /// Gain for the left and right input channels
        input_gains: [f32; 2],
    },
}

impl SpeakerSelector {
    /// Indexed pair selector
    pub fn pair(
        left: Option<OutputSpeaker>,
        right: Option<OutputSpeaker>,
        input_gains: [f32; 2],
    ) -> Self {
        Self::Pair {
            left,
            right,
            input_gains,
        }
    }
}

impl From<LegacySpeaker> for SpeakerSelector {
    fn from(speaker: LegacySpeaker) -> Self {
        Self::Legacy(speaker)
    }
}

/// Write the gain matrix for `selector` onto `channel`
///
/// Errors (typically a stale channel) are logged and swallowed: a stopped
/// channel has nothing left to route.
pub fn route<E: AudioEngine + ?Sized>(
    engine: &E,
    channel: ChannelHandle,
    selector: &SpeakerSelector,
) {
    match *selector {
        SpeakerSelector::Legacy(speaker) => {
            let mix = speaker.mix();
            debug!("Routing channel {:?} to {:?}: {:?}", channel, speaker, mix);
            if let Err(e) = engine.set_channel_speaker_mix(channel, &mix) {
                warn!("Failed to set speaker mix on {:?}: {}", channel, e);
            }
        }
        SpeakerSelector::Pair {
            left,
            right,
            input_gains,
        } => {
            // Each output gets only its own input component, never a blend.
            let left_levels = [input_gains[0], 0.0];
            let right_levels = [0.0, input_gains[1]];

            if let Some(speaker) = left {
                debug!("Routing left input of {:?} to {}", channel, speaker);
                if let Err(e) =
                    engine.set_channel_speaker_levels(channel, speaker.index(), &left_levels)
                {
                    warn!("Failed to set levels for {} on {:?}: {}", speaker, channel, e);
                }
            }

            if let Some(speaker) = right {
                debug!("Routing right input of {:?} to {}", channel, speaker);
                if let Err(e) =
                    engine.set_channel_speaker_levels(channel, speaker.index(), &right_levels)
                {
                    warn!("Failed to set levels for {} on {:?}: {}", speaker, channel, e);
                }
            }
        }
    }
}
