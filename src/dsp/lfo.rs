//! Low Frequency Oscillator (LFO) used by SoundFont voices.

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running below the audio range. It is never heard
directly; it wiggles some other parameter.

Vocabulary
----------

  control-rate    Evaluated once per render block instead of once per
                  sample. At 128 frames and 48 kHz that is 375 updates a
                  second, plenty for anything under ~20 Hz.

  bipolar         Output swings -1.0 .. +1.0 so the modulated parameter
                  moves both above and below its resting value.

  delay           Time after note-on before the LFO starts. Until then its
                  output is exactly 0, not -1.


SoundFont LFOs
--------------

Every voice carries two, both triangles:

    vibrato LFO   pitch only             freqVibLFO, delayVibLFO
    mod LFO       pitch, cutoff, volume  freqModLFO, delayModLFO

A channel can layer a third "NRPN" vibrato on top. All three use the same
function below; they differ only in where start time and rate come from.


Triangle From Absolute Time
---------------------------

The LFO keeps no phase accumulator. Its value is a pure function of the
synth clock, which means a voice can be re-created or have its rate changed
without drifting:

    x     = (now - start) * freq - 0.25
    value = |x - round(x)| * 4 - 1

The -0.25 phase shift makes the wave start at 0 instead of at a corner:

     1 |          /\
     0 | \       /  \       /
    -1 |  \    /     \    /
           \/          \/
       start

    t=start       → 0
    quarter cycle → -1
    three quarter → +1
*/

/// Triangle LFO in [-1, 1] started at `start_time` seconds.
///
/// Returns 0 before the start time.
///
/// # Example
/// ```
/// use saavy_sf::dsp::lfo::triangle_lfo;
/// assert_eq!(triangle_lfo(1.0, 5.0, 0.5), 0.0); // not started
/// assert!((triangle_lfo(0.0, 1.0, 0.75) - 1.0).abs() < 1e-6); // peak
/// ```
#[inline]
pub fn triangle_lfo(start_time: f64, freq_hz: f32, now: f64) -> f32 {
    if now < start_time {
        return 0.0;
    }
    let x = (now - start_time) * freq_hz as f64 - 0.25;
    ((x - (x + 0.5).trunc()).abs() * 4.0 - 1.0) as f32
}
