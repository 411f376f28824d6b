use tracing::debug;

use super::channel::Channel;
use super::voice::Voice;

const DRUM_BONUS: f32 = 5.0;
const RELEASE_PENALTY: f32 = 10.0;
const VELOCITY_DIVISOR: f32 = 25.0;
const ATTENUATION_DIVISOR: f32 = 50.0;

/// Higher means more worth keeping.
///
/// Drums are favoured, releasing voices lose out, loud and early-envelope
/// voices are kept over quiet and decayed ones.
pub fn voice_priority(voice: &Voice, drum: bool) -> f32 {
    let mut priority = 0.0;
    if drum {
        priority += DRUM_BONUS;
    }
    if voice.is_in_release() {
        priority -= RELEASE_PENALTY;
    }
    priority += voice.velocity() as f32 / VELOCITY_DIVISOR;
    priority -= voice.envelope_state().index() as f32;
    priority -= voice.current_attenuation_db() / ATTENUATION_DIVISOR;
    priority
}

/// Marks the lowest-priority voices finished until at most `cap` remain.
/// Returns how many were stolen.
///
/// Ties go to the voice found first (lower channel, older voice).
pub fn enforce_voice_cap(channels: &mut [Channel], cap: usize) -> usize {
    let live: usize = channels.iter().map(Channel::voice_count).sum();
    let excess = live.saturating_sub(cap);
    for _ in 0..excess {
        let mut victim: Option<(usize, usize, f32)> = None;
        for (c, channel) in channels.iter().enumerate() {
            for (v, voice) in channel.voices.iter().enumerate().filter(|(_, v)| !v.is_finished()) {
                let priority = voice_priority(voice, channel.is_drum());
                if victim.is_none_or(|(_, _, lowest)| priority < lowest) {
                    victim = Some((c, v, priority));
                }
            }
        }
        if let Some((c, v, _)) = victim {
            channels[c].voices[v].finished = true;
        }
    }
    if excess > 0 {
        debug!(cap, stolen = excess, "voice cap reached");
    }
    excess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::modulator::default_modulators;
    use crate::bank::preset::VoiceLayer;
    use crate::bank::sample::Sample;
    use crate::bank::InstrumentBank;
    use crate::bank::parts::{BankBuilder, ZoneBuilder};

    fn voice(velocity: u8) -> Voice {
        let sample = Sample::new("s", 0, 100, 0, 100, 48_000, 60, 0, 0, 1);
        let layer = VoiceLayer {
            instrument_generators: Vec::new(),
            preset_generators: Vec::new(),
            modulators: default_modulators(),
            sample: 0,
        };
        Voice::from_layer(&layer, &sample, 60, velocity, 48_000.0)
    }

    fn empty_bank() -> InstrumentBank {
        let mut builder = BankBuilder::new("steal");
        let s = builder.add_sample("s", &[0.0; 16], 48_000, 60);
        let inst = builder.add_instrument("i", vec![ZoneBuilder::sample(s)]);
        builder.add_preset("p", 0, 0, vec![ZoneBuilder::instrument(inst)]);
        InstrumentBank::from_parts(builder.build()).expect("valid bank")
    }

    #[test]
    fn drum_and_velocity_raise_priority() {
        let soft = voice_priority(&voice(25), false);
        let loud = voice_priority(&voice(125), false);
        assert!((loud - soft - 4.0).abs() < 1e-5);
        assert!((voice_priority(&voice(25), true) - soft - 5.0).abs() < 1e-5);
    }

    #[test]
    fn release_lowers_priority() {
        let mut released = voice(100);
        let held = voice_priority(&released, false);
        released.release(0.0, 0.0);
        assert!((held - voice_priority(&released, false) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn steals_the_lowest_voices() {
        let bank = empty_bank();
        let mut channels = vec![Channel::new(0, false, &bank), Channel::new(1, true, &bank)];
        channels[0].voices = vec![voice(10), voice(120), voice(20)];
        channels[1].voices = vec![voice(10)];
        let stolen = enforce_voice_cap(&mut channels, 2);
        assert_eq!(stolen, 2);
        let finished: Vec<bool> = channels[0].voices.iter().map(Voice::is_finished).collect();
        assert_eq!(finished, vec![true, false, true]);
        assert!(!channels[1].voices[0].is_finished());
    }

    #[test]
    fn under_the_cap_nothing_happens() {
        let bank = empty_bank();
        let mut channels = vec![Channel::new(0, false, &bank)];
        channels[0].voices = vec![voice(10)];
        assert_eq!(enforce_voice_cap(&mut channels, 4), 0);
        assert!(!channels[0].voices[0].is_finished());
    }
}
