use crate::dsp::oscillator::Interpolation;
use crate::error::{Error, Result};
use crate::MIDI_CHANNEL_COUNT;

/// Engine settings fixed at construction. Most of them can later be
/// changed through the control handle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SynthConfig {
    pub sample_rate: f32,
    /// Number of MIDI channels, 1..=16.
    pub channel_count: usize,
    /// Maximum simultaneous voices across all channels.
    pub voice_cap: usize,
    pub interpolation: Interpolation,
    pub effects_enabled: bool,
    /// Capacity of the control → audio queue.
    pub message_capacity: usize,
    /// Capacity of the audio → control event queue.
    pub event_capacity: usize,
    /// Seconds a note sounds before a note-off may release it.
    pub min_note_length: f64,
    /// Channel index playing from the percussion bank.
    pub drum_channel: Option<u8>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            channel_count: MIDI_CHANNEL_COUNT,
            voice_cap: 250,
            interpolation: Interpolation::Linear,
            effects_enabled: true,
            message_capacity: 1024,
            event_capacity: 256,
            min_note_length: 0.03,
            drum_channel: Some(9),
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !(1..=MIDI_CHANNEL_COUNT).contains(&self.channel_count) {
            return Err(Error::InvalidConfig(format!(
                "channel count must be 1..={MIDI_CHANNEL_COUNT}, got {}",
                self.channel_count
            )));
        }
        if self.voice_cap == 0 {
            return Err(Error::InvalidConfig("voice cap must be at least 1".into()));
        }
        if self.message_capacity == 0 || self.event_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacities must be at least 1".into()));
        }
        if !(self.min_note_length.is_finite() && self.min_note_length >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "minimum note length must be >= 0, got {}",
                self.min_note_length
            )));
        }
        if let Some(drum) = self.drum_channel.filter(|&c| c as usize >= self.channel_count) {
            return Err(Error::InvalidConfig(format!(
                "drum channel {drum} is outside {} channels",
                self.channel_count
            )));
        }
        Ok(())
    }
}
