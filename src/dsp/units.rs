//! SoundFont unit conversions.

/*
Logarithmic Units
=================

SoundFont generators store almost everything on logarithmic scales, so one
integer step is always the same perceptual step.

Vocabulary
----------

  timecent     1/1200 of a doubling of time.
                 seconds = 2^(tc / 1200)
               0 tc is one second, -1200 tc half a second, 1200 tc two.
               -32768 is "no time at all".

  abs cent     Pitch in cents above 8.176 Hz (MIDI key 0).
                 Hz = 440 * 2^((cents - 6900) / 1200)
               6900 is A4; 13500 is about 20 kHz.

  centibel     A tenth of a decibel. Attenuations are positive numbers:
               0 cB is full level, 960 cB is 96 dB down.

  attenuation  gain = 10^(-dB / 20)


Gain Lookup
-----------

The volume envelope converts dB to gain for every output sample. pow() per
sample is the single most expensive thing a voice could do, so the
conversion goes through a table with one entry per centibel and a linear
blend between entries:

    dB       -166.0 .. +160.0     (negative = boost from modulators)
    index    (dB * 10) + 1660
    entries  3261

Outside the table the value sticks to the nearest end.
*/

/// Timecents to seconds. The SF2 minimum (-32768) maps to zero.
#[inline]
pub fn timecents_to_seconds(timecents: f32) -> f32 {
    if timecents <= -32767.0 {
        return 0.0;
    }
    (timecents / 1200.0).exp2()
}

/// Absolute cents to Hz.
#[inline]
pub fn abs_cents_to_hz(cents: f32) -> f32 {
    440.0 * ((cents - 6900.0) / 1200.0).exp2()
}

/// Attenuation in dB to linear gain, computed directly.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(-db / 20.0)
}

/// Linear gain to attenuation in dB.
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    -20.0 * gain.log10()
}

const TABLE_MIN_CB: i32 = -1660;
const TABLE_MAX_CB: i32 = 1600;
const TABLE_LEN: usize = (TABLE_MAX_CB - TABLE_MIN_CB + 1) as usize;

/// Interpolated dB → gain lookup.
#[derive(Debug, Clone)]
pub struct GainTable {
    gains: Box<[f32]>,
}

impl GainTable {
    pub fn new() -> Self {
        let gains = (0..TABLE_LEN)
            .map(|i| db_to_gain((i as i32 + TABLE_MIN_CB) as f32 / 10.0))
            .collect();
        Self { gains }
    }

    /// Gain for an attenuation in dB.
    #[inline]
    pub fn gain(&self, db: f32) -> f32 {
        let position = (db * 10.0 - TABLE_MIN_CB as f32).clamp(0.0, (TABLE_LEN - 1) as f32);
        let index = position as usize;
        let fraction = position - index as f32;
        let lower = self.gains[index];
        match self.gains.get(index + 1) {
            Some(&upper) => lower + (upper - lower) * fraction,
            None => lower,
        }
    }
}

impl Default for GainTable {
    fn default() -> Self {
        Self::new()
    }
}
