use std::f64::consts::PI;

use super::units::{abs_cents_to_hz, db_to_gain};

/*
Resonant Low-Pass
=================

Every SoundFont voice runs through a 2-pole low-pass biquad. Its inputs are
generator values, not Hz:

  initialFilterFc   cutoff in absolute cents (1500 .. 13500)
  initialFilterQ    resonance peak in centibels (0 .. 960)

Vocabulary
----------

  biquad       y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]
               Two samples of input history, two of output history.

  excursion    Cents added to the cutoff by the mod LFO and mod envelope for
               this block.

  open         Cutoff at the top of the range with no resonance. The filter
               would do nothing audible, so it is skipped entirely.


Coefficients (RBJ cookbook low-pass, SF2 gain rules)
----------------------------------------------------

    fc         = min(Hz(cutoff_cents), 0.45 * sample_rate)
    w          = 2π fc / sample_rate
    q_db       = q_cb / 10
    resonance  = 10^((q_db - 3.01) / 20)     3.01 dB makes Q = 0 flat
    alpha      = sin(w) / (2 * resonance)
    q_gain     = 1 / sqrt(10^(q_db / 20))    SF2 lowers the passband as Q rises

    b1 = (1 - cos w) * q_gain     b0 = b2 = b1 / 2
    a0 = 1 + alpha    a1 = -2 cos w    a2 = 1 - alpha

All five are divided by a0.


Change Detection
----------------

Coefficients cost a sin, a cos and two pows. They are recomputed only when
the target cutoff moves by more than one cent or the Q changes. The static
cutoff itself glides toward its modulated value by 10 % per block so that a
CC74 sweep does not zipper.
*/

/// Per-block glide of the static cutoff toward its modulated value.
pub const FILTER_SMOOTHING_FACTOR: f32 = 0.1;

const OPEN_CUTOFF_CENTS: f32 = 13500.0;
const OPEN_THRESHOLD_CENTS: f32 = 13499.0;

#[derive(Debug, Clone)]
pub struct LowpassFilter {
    sample_rate: f64,
    max_cutoff_hz: f64,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,

    resonance_cb: i32,
    current_initial_fc: f32,
    last_target_cutoff: f32,
    initialized: bool,
}

impl LowpassFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            max_cutoff_hz: sample_rate as f64 * 0.45,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            resonance_cb: 0,
            current_initial_fc: OPEN_CUTOFF_CENTS,
            last_target_cutoff: f32::INFINITY,
            initialized: false,
        }
    }

    /// Filters `buffer` in place.
    ///
    /// `initial_fc` and `q_cb` are the modulated generator values; `excursion`
    /// is the LFO and envelope offset in cents.
    pub fn process(&mut self, buffer: &mut [f32], initial_fc: i32, q_cb: i32, excursion: f32) {
        let initial_fc = initial_fc as f32;
        if self.initialized {
            self.current_initial_fc += (initial_fc - self.current_initial_fc) * FILTER_SMOOTHING_FACTOR;
        } else {
            self.initialized = true;
            self.current_initial_fc = initial_fc;
        }

        let target_cutoff = self.current_initial_fc + excursion;
        if self.is_open(target_cutoff, q_cb) {
            self.current_initial_fc = OPEN_CUTOFF_CENTS;
            return;
        }

        if (self.last_target_cutoff - target_cutoff).abs() > 1.0 || self.resonance_cb != q_cb {
            self.last_target_cutoff = target_cutoff;
            self.resonance_cb = q_cb;
            self.calculate_coefficients(target_cutoff);
        }

        for sample in buffer.iter_mut() {
            let input = *sample;
            let filtered = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
            self.x2 = self.x1;
            self.x1 = input;
            self.y2 = self.y1;
            self.y1 = filtered;
            *sample = filtered;
        }
    }

    fn is_open(&self, target_cutoff: f32, q_cb: i32) -> bool {
        self.current_initial_fc > OPEN_THRESHOLD_CENTS && target_cutoff > OPEN_THRESHOLD_CENTS && q_cb == 0
    }

    fn calculate_coefficients(&mut self, cutoff_cents: f32) {
        let cutoff_hz = (abs_cents_to_hz(cutoff_cents.trunc()) as f64).min(self.max_cutoff_hz);
        let q_db = self.resonance_cb as f32 / 10.0;
        let resonance_gain = db_to_gain(-(q_db - 3.01)) as f64;
        let q_gain = 1.0 / (db_to_gain(-q_db) as f64).sqrt();

        let w = 2.0 * PI * cutoff_hz / self.sample_rate;
        let cos_w = w.cos();
        let alpha = w.sin() / (2.0 * resonance_gain);

        let b1 = (1.0 - cos_w) * q_gain;
        let b0 = b1 / 2.0;
        let a0 = 1.0 + alpha;

        self.b0 = (b0 / a0) as f32;
        self.b1 = (b1 / a0) as f32;
        self.b2 = (b0 / a0) as f32;
        self.a1 = (-2.0 * cos_w / a0) as f32;
        self.a2 = ((1.0 - alpha) / a0) as f32;
    }
}
