use crate::bank::generator::{GeneratorSet, GeneratorType};

use super::units::{db_to_gain, timecents_to_seconds, GainTable};

/*
SoundFont Volume Envelope
=========================

The volume envelope decides how loud a voice is at every sample. It is a
DAHDSR shape whose levels live in decibels of attenuation, not in linear
gain.

Vocabulary
----------

  attenuation     How far below full level the voice sits, in dB. 0 dB is
                  the peak, 100 dB is treated as silence.

  target gain     The voice's static level from the initialAttenuation
                  generator (velocity, CC7 and CC11 all land here through
                  modulators). Smoothed every sample so controller moves do
                  not step.

  sustain         Given in dB BELOW the peak, not as a level. 0 means the
                  note stays at its peak, 96 dB is practically silent.

  release start   The dB value the envelope was at when release began. Release
                  always ramps from there to silence.


The Shape
---------

    dB
     0  ┤        ┌──────┐
        │       ╱        ╲
        │      ╱          ╲______________
   sus  ┤     ╱                          ╲
        │    ╱                            ╲
   100  ┼───╱──────────────────────────────╲──→ time
        delay attack hold  decay  sustain   release

Every segment is a straight line in dB, which sounds like a natural
exponential fade. The one exception is attack: it is a straight line in
GAIN, from 0 to the target. A dB-linear attack would sit inaudible for most
of its length and then jump.


Timing Rules
------------

  delay, attack, hold, decay, release are timecents.

  hold and decay are key-scaled:
      tc += (60 - key) * keyNumToVolEnvHold / keyNumToVolEnvDecay

  decay is specified as the time from peak to -100 dB, so the real time to
  reach the sustain level is shortened:
      decay_samples = samples(decay_tc) * sustain_db / 100

  release is specified as the time from peak to -100 dB as well, and gets
  shortened by how far down the envelope already is:
      release_samples = samples(release_tc) * (100 - start_db) / 100


Release Start per State
-----------------------

    delay     100 dB (nothing was audible yet)
    attack    the dB value of the attack's linear gain at that moment
    hold      0 dB
    decay     the interpolated dB at that moment
    sustain   sustain dB

Anything starting at 90 dB or lower is already inaudible; the voice is
finished on the spot.
*/

/// Per-sample smoothing applied to the target gain.
pub const VOLUME_ENVELOPE_SMOOTHING_FACTOR: f32 = 0.01;

const DB_SILENCE: f64 = 100.0;
const PERCEIVED_DB_SILENCE: f64 = 90.0;
// about 96 dB down
const PERCEIVED_GAIN_SILENCE: f32 = 0.000015;

/// Non-release stages of the envelope. Release is tracked separately since
/// it can interrupt any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvelopeState {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
}

impl EnvelopeState {
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// The generator inputs of a volume envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeEnvelopeParams {
    /// Centibels.
    pub attenuation: i32,
    pub delay: i32,
    pub attack: i32,
    pub hold: i32,
    pub decay: i32,
    /// Centibels below peak.
    pub sustain: i32,
    pub release: i32,
    pub key_to_hold: i32,
    pub key_to_decay: i32,
    pub key: u8,
}

impl VolumeEnvelopeParams {
    pub fn from_generators(generators: &GeneratorSet, key: u8) -> Self {
        let g = |kind: GeneratorType| generators[kind.index()];
        Self {
            attenuation: g(GeneratorType::InitialAttenuation),
            delay: g(GeneratorType::DelayVolEnv),
            attack: g(GeneratorType::AttackVolEnv),
            hold: g(GeneratorType::HoldVolEnv),
            decay: g(GeneratorType::DecayVolEnv),
            sustain: g(GeneratorType::SustainVolEnv),
            release: g(GeneratorType::ReleaseVolEnv),
            key_to_hold: g(GeneratorType::KeyNumToVolEnvHold),
            key_to_decay: g(GeneratorType::KeyNumToVolEnvDecay),
            key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeEnvelope {
    sample_rate: f64,
    state: EnvelopeState,
    releasing: bool,
    finished: bool,
    can_end_on_silent_sustain: bool,

    current_sample: u64,
    current_attenuation_db: f64,

    // smoothed target level
    attenuation: f32,
    attenuation_target_gain: f32,
    gain_primed: bool,
    sustain_db_relative: f64,

    // absolute segment ends, in samples since note-on
    attack_duration: f64,
    decay_duration: f64,
    delay_end: f64,
    attack_end: f64,
    hold_end: f64,
    decay_end: f64,

    release_start_sample: u64,
    release_start_db: f64,
    release_duration: f64,
}

impl VolumeEnvelope {
    pub fn new(sample_rate: f32, initial_sustain_cb: i32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            state: EnvelopeState::Delay,
            releasing: false,
            finished: false,
            can_end_on_silent_sustain: initial_sustain_cb as f64 / 10.0 >= PERCEIVED_DB_SILENCE,
            current_sample: 0,
            current_attenuation_db: DB_SILENCE,
            attenuation: 0.0,
            attenuation_target_gain: 0.0,
            gain_primed: false,
            sustain_db_relative: 0.0,
            attack_duration: 0.0,
            decay_duration: 0.0,
            delay_end: 0.0,
            attack_end: 0.0,
            hold_end: 0.0,
            decay_end: 0.0,
            release_start_sample: 0,
            release_start_db: DB_SILENCE,
            release_duration: 0.0,
        }
    }

    fn timecents_to_samples(&self, timecents: i32) -> f64 {
        (timecents_to_seconds(timecents as f32) as f64 * self.sample_rate)
            .floor()
            .max(0.0)
    }

    /// Rebuilds segment timing from (possibly modulated) generators.
    pub fn recalculate(&mut self, params: &VolumeEnvelopeParams) {
        let target_db = params.attenuation.clamp(0, 1440) as f32 / 10.0;
        self.attenuation_target_gain = db_to_gain(target_db);
        if !self.gain_primed {
            self.attenuation = self.attenuation_target_gain;
            self.gain_primed = true;
        }

        self.sustain_db_relative = (params.sustain as f64 / 10.0).min(DB_SILENCE);
        let sustain_db = self.sustain_db_relative.clamp(0.0, DB_SILENCE);
        let key_offset = 60 - params.key as i32;

        self.attack_duration = self.timecents_to_samples(params.attack);
        let decay_tc = params.decay + key_offset * params.key_to_decay;
        self.decay_duration = self.timecents_to_samples(decay_tc) * sustain_db / DB_SILENCE;
        self.release_duration = self.timecents_to_samples(params.release);

        self.delay_end = self.timecents_to_samples(params.delay);
        self.attack_end = self.delay_end + self.attack_duration;
        let hold_tc = params.hold + key_offset * params.key_to_hold;
        self.hold_end = self.attack_end + self.timecents_to_samples(hold_tc);
        self.decay_end = self.hold_end + self.decay_duration;

        if self.state == EnvelopeState::Delay && self.attack_end == 0.0 {
            self.state = EnvelopeState::Hold;
        }

        if self.releasing {
            let start = self.release_start_sample as f64;
            let start_db = match self.state {
                EnvelopeState::Delay => DB_SILENCE,
                EnvelopeState::Attack => {
                    let progress = if self.attack_duration > 0.0 {
                        1.0 - (self.attack_end - start) / self.attack_duration
                    } else {
                        1.0
                    };
                    if progress > 0.0 {
                        -20.0 * progress.log10()
                    } else {
                        DB_SILENCE
                    }
                }
                EnvelopeState::Hold => 0.0,
                EnvelopeState::Decay => {
                    if self.decay_duration > 0.0 {
                        (1.0 - (self.decay_end - start) / self.decay_duration) * sustain_db
                    } else {
                        sustain_db
                    }
                }
                EnvelopeState::Sustain => sustain_db,
            };
            self.release_start_db = start_db.clamp(0.0, DB_SILENCE);
            if self.release_start_db >= PERCEIVED_DB_SILENCE {
                self.finished = true;
            }
            self.release_duration *= (DB_SILENCE - self.release_start_db) / DB_SILENCE;
        }
    }

    /// Enters release from the current position.
    pub fn start_release(&mut self, params: &VolumeEnvelopeParams) {
        self.releasing = true;
        self.release_start_sample = self.current_sample;
        self.recalculate(params);
    }

    fn advance_state(&mut self) {
        let t = self.current_sample as f64;
        loop {
            let next = match self.state {
                EnvelopeState::Delay if t >= self.delay_end => EnvelopeState::Attack,
                EnvelopeState::Attack if t >= self.attack_end => EnvelopeState::Hold,
                EnvelopeState::Hold if t >= self.hold_end => EnvelopeState::Decay,
                EnvelopeState::Decay if t >= self.decay_end => EnvelopeState::Sustain,
                _ => break,
            };
            self.state = next;
        }
    }

    /// Applies the envelope to a block in place.
    ///
    /// `centibel_offset` is an extra attenuation (the mod LFO's tremolo).
    pub fn apply(&mut self, buffer: &mut [f32], centibel_offset: f32, gains: &GainTable) {
        let db_offset = centibel_offset / 10.0;

        if self.releasing {
            self.apply_release(buffer, db_offset, gains);
            return;
        }

        for sample in buffer.iter_mut() {
            self.advance_state();
            let t = self.current_sample as f64;
            if self.state != EnvelopeState::Delay {
                self.attenuation += (self.attenuation_target_gain - self.attenuation) * VOLUME_ENVELOPE_SMOOTHING_FACTOR;
            }
            match self.state {
                EnvelopeState::Delay => {
                    self.current_attenuation_db = DB_SILENCE;
                    *sample = 0.0;
                }
                EnvelopeState::Attack => {
                    let linear = (1.0 - (self.attack_end - t) / self.attack_duration) as f32;
                    *sample *= linear * self.attenuation * gains.gain(db_offset);
                    self.current_attenuation_db = 0.0;
                }
                EnvelopeState::Hold => {
                    *sample *= self.attenuation * gains.gain(db_offset);
                    self.current_attenuation_db = 0.0;
                }
                EnvelopeState::Decay => {
                    self.current_attenuation_db =
                        (1.0 - (self.decay_end - t) / self.decay_duration) * self.sustain_db_relative;
                    *sample *= self.attenuation * gains.gain(self.current_attenuation_db as f32 + db_offset);
                }
                EnvelopeState::Sustain => {
                    self.current_attenuation_db = self.sustain_db_relative;
                    *sample *= self.attenuation * gains.gain(self.sustain_db_relative as f32 + db_offset);
                }
            }
            self.current_sample += 1;
        }

        if self.state == EnvelopeState::Sustain
            && self.can_end_on_silent_sustain
            && self.sustain_db_relative >= PERCEIVED_DB_SILENCE
        {
            self.finished = true;
        }
    }

    fn apply_release(&mut self, buffer: &mut [f32], db_offset: f32, gains: &GainTable) {
        let mut elapsed = (self.current_sample - self.release_start_sample) as f64;
        if elapsed >= self.release_duration {
            buffer.fill(0.0);
            self.current_attenuation_db = DB_SILENCE;
            self.current_sample += buffer.len() as u64;
            self.finished = true;
            return;
        }

        let db_difference = DB_SILENCE - self.release_start_db;
        let mut gain = 1.0;
        for sample in buffer.iter_mut() {
            self.attenuation += (self.attenuation_target_gain - self.attenuation) * VOLUME_ENVELOPE_SMOOTHING_FACTOR;
            let db = ((elapsed / self.release_duration) * db_difference + self.release_start_db).min(DB_SILENCE);
            self.current_attenuation_db = db;
            gain = self.attenuation * gains.gain(db as f32 + db_offset);
            *sample *= gain;
            self.current_sample += 1;
            elapsed += 1.0;
        }
        if gain <= PERCEIVED_GAIN_SILENCE {
            self.finished = true;
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn is_releasing(&self) -> bool {
        self.releasing
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current position in dB below the target level.
    pub fn current_attenuation_db(&self) -> f32 {
        self.current_attenuation_db as f32
    }

    /// Release length in samples, after scaling by the start level.
    pub fn release_samples(&self) -> f64 {
        self.release_duration
    }
}
