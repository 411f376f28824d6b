#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bank::generator::{GeneratorSet, GeneratorType};
use crate::bank::sample::Sample;

/*
Wavetable Oscillator
====================

A SoundFont voice does not synthesize a waveform; it replays recorded PCM
at a variable speed. Pitch comes entirely from how fast a fractional read
cursor walks through the sample.

Vocabulary
----------

  cursor          Fractional position in the sample, in frames.
                  Integer part picks the frame, fraction blends neighbours.

  playback step   Frames advanced per output sample at the root key:
                    step = sample_rate / output_rate * 2^(correction / 1200)
                  A 44.1 kHz sample on a 48 kHz engine moves 0.91875 per tick.

  tuning ratio    Extra multiplier from the voice's pitch (key, bends,
                  vibrato). Cursor advance per sample = step * ratio.

  loop            A [loop_start, loop_end) region the cursor wraps inside
                  so a short recording can sustain forever.


Loop Modes (sampleModes generator)
----------------------------------

    0  no loop            play once, voice ends at the sample end
    1  loop               wrap forever; the envelope ends the voice
    2  (reserved)         treated as no loop
    3  loop until release wrap while held, then run out the tail


Interpolation
-------------

NEAREST
    out = data[floor(cursor)]
    Cheapest. Aliases badly when pitched up but is bit-exact at ratio 1.

LINEAR
    out = data[i] + (data[i + 1] - data[i]) * fraction
    The default. Good quality per CPU cycle.

CUBIC (4-point, Catmull-Rom style)
    Reads data[i - 1 .. i + 2] and fits a cubic through them; smoother
    highs when samples are pitched far from their root.

While looping every neighbour index wraps inside the loop. Past the end of
a non-looping sample neighbours read as silence.


Offsets
-------

Eight generators move the sample's start, end and loop points:

    point = header_point + fine + coarse * 32768

All four are clamped into the PCM. A loop whose end lands before its start
is swapped; one that collapses to nothing disables looping.
*/

const COARSE_OFFSET: i64 = 32768;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    NoLoop,
    Loop,
    LoopUntilRelease,
}

impl LoopMode {
    pub fn from_generator(value: i32) -> Self {
        match value {
            1 => LoopMode::Loop,
            3 => LoopMode::LoopUntilRelease,
            _ => LoopMode::NoLoop,
        }
    }
}

/// Frame positions after generator offsets, relative to the first PCM frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRegion {
    pub start: usize,
    pub end: usize,
    pub loop_start: usize,
    pub loop_end: usize,
}

impl SampleRegion {
    pub fn from_generators(sample: &Sample, generators: &GeneratorSet) -> Self {
        let len = sample.frame_count() as i64;
        let g = |kind: GeneratorType| generators[kind.index()] as i64;
        let offset = |base: i64, fine: GeneratorType, coarse: GeneratorType| {
            (base + g(fine) + g(coarse) * COARSE_OFFSET).clamp(0, len) as usize
        };
        let (loop_start, loop_end) = sample.loop_range();

        let loop_start = offset(
            loop_start as i64,
            GeneratorType::StartLoopAddrsOffset,
            GeneratorType::StartLoopAddrsCoarseOffset,
        );
        let loop_end = offset(
            loop_end as i64,
            GeneratorType::EndLoopAddrsOffset,
            GeneratorType::EndLoopAddrsCoarseOffset,
        );
        let (loop_start, loop_end) = if loop_end < loop_start {
            (loop_end, loop_start)
        } else {
            (loop_start, loop_end)
        };

        Self {
            start: offset(0, GeneratorType::StartAddrsOffset, GeneratorType::StartAddrsCoarseOffset),
            end: offset(len, GeneratorType::EndAddrsOffset, GeneratorType::EndAddrsCoarseOffset),
            loop_start,
            loop_end,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WavetableOscillator {
    cursor: f64,
    playback_step: f64,
    region: SampleRegion,
    mode: LoopMode,
    looping: bool,
}

impl WavetableOscillator {
    pub fn new(sample: &Sample, output_sample_rate: f32, generators: &GeneratorSet) -> Self {
        let region = SampleRegion::from_generators(sample, generators);
        let mode = LoopMode::from_generator(generators[GeneratorType::SampleModes.index()]);
        let correction = (sample.pitch_correction as f64 / 1200.0).exp2();
        Self {
            cursor: region.start as f64,
            playback_step: sample.sample_rate as f64 / output_sample_rate as f64 * correction,
            looping: mode != LoopMode::NoLoop && region.loop_end > region.loop_start,
            region,
            mode,
        }
    }

    pub fn region(&self) -> SampleRegion {
        self.region
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn playback_step(&self) -> f64 {
        self.playback_step
    }

    /// Leaves the loop of a loop-until-release sample.
    pub fn stop_looping(&mut self) {
        if self.mode == LoopMode::LoopUntilRelease {
            self.looping = false;
        }
    }

    /// Moves the cursor to where it would be after `frames` output samples
    /// at a constant `ratio`. Returns true when that is past the end.
    pub fn seek(&mut self, frames: f64, ratio: f64) -> bool {
        let cursor = self.region.start as f64 + frames * self.playback_step * ratio;
        let loop_start = self.region.loop_start as f64;
        let loop_end = self.region.loop_end as f64;
        if self.looping && cursor >= loop_end {
            self.cursor = loop_start + (cursor - loop_start) % (loop_end - loop_start);
            false
        } else {
            self.cursor = cursor;
            cursor.floor() >= self.region.end as f64
        }
    }

    /// Fills `out` from `pcm`. Returns true once the sample has run out;
    /// the rest of the block is then silent.
    pub fn render(&mut self, pcm: &[f32], ratio: f64, out: &mut [f32], interpolation: Interpolation) -> bool {
        let increment = self.playback_step * ratio;
        if self.looping {
            self.render_looping(pcm, increment, out, interpolation);
            false
        } else {
            self.render_once(pcm, increment, out, interpolation)
        }
    }

    fn render_looping(&mut self, pcm: &[f32], increment: f64, out: &mut [f32], interpolation: Interpolation) {
        let loop_start = self.region.loop_start;
        let loop_end = self.region.loop_end;
        let loop_length = loop_end - loop_start;
        let at = |i: usize| pcm.get(i).copied().unwrap_or(0.0);
        let wrap = |i: usize| if i >= loop_end { i - loop_length } else { i };

        let mut cursor = self.cursor;
        for sample in out.iter_mut() {
            while cursor >= loop_end as f64 {
                cursor -= loop_length as f64;
            }
            let floor = cursor as usize;
            let fraction = (cursor - floor as f64) as f32;

            *sample = match interpolation {
                Interpolation::Nearest => at(floor),
                Interpolation::Linear => {
                    let lower = at(floor);
                    let upper = at(wrap(floor + 1));
                    lower + (upper - lower) * fraction
                }
                Interpolation::Cubic => {
                    let before = if floor == loop_start {
                        at(loop_end - 1)
                    } else if floor == 0 {
                        0.0
                    } else {
                        at(floor - 1)
                    };
                    cubic(before, at(floor), at(wrap(floor + 1)), at(wrap(wrap(floor + 1) + 1)), fraction)
                }
            };
            cursor += increment;
        }
        self.cursor = cursor;
    }

    fn render_once(&mut self, pcm: &[f32], increment: f64, out: &mut [f32], interpolation: Interpolation) -> bool {
        let end = self.region.end.min(pcm.len());
        let at = |i: usize| if i < end { pcm[i] } else { 0.0 };

        let mut cursor = self.cursor;
        for i in 0..out.len() {
            let floor = cursor as usize;
            if floor >= end {
                out[i..].fill(0.0);
                self.cursor = cursor;
                return true;
            }
            let fraction = (cursor - floor as f64) as f32;

            out[i] = match interpolation {
                Interpolation::Nearest => pcm[floor],
                Interpolation::Linear => {
                    let lower = pcm[floor];
                    lower + (at(floor + 1) - lower) * fraction
                }
                Interpolation::Cubic => {
                    let before = if floor == 0 { 0.0 } else { at(floor - 1) };
                    cubic(before, pcm[floor], at(floor + 1), at(floor + 2), fraction)
                }
            };
            cursor += increment;
        }
        self.cursor = cursor;
        false
    }
}

/// Cubic through four points, evaluated between `x1` and `x2`.
#[inline]
fn cubic(x0: f32, x1: f32, x2: f32, x3: f32, t: f32) -> f32 {
    let c1 = 0.5 * (x2 - x0);
    let c2 = x0 - 2.5 * x1 + 2.0 * x2 - 0.5 * x3;
    let c3 = 0.5 * (x3 - x0) + 1.5 * (x1 - x2);
    ((c3 * t + c2) * t + c1) * t + x1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::generator::default_generators;
    use approx::assert_abs_diff_eq;

    const SR: f32 = 44_100.0;

    fn sample(len: u32, loop_start: u32, loop_end: u32) -> Sample {
        Sample::new("test", 0, len, loop_start, loop_end, SR as u32, 60, 0, 0, 1)
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    fn generators(mode: i32) -> GeneratorSet {
        let mut g = default_generators();
        g[GeneratorType::SampleModes.index()] = mode;
        g
    }

    #[test]
    fn nearest_at_unity_reproduces_the_pcm() {
        let pcm: Vec<f32> = (0..37).map(|i| ((i * 7) % 11) as f32 / 11.0 - 0.5).collect();
        let mut osc = WavetableOscillator::new(&sample(37, 0, 0), SR, &generators(0));
        let mut out = vec![1.0; 48];
        let finished = osc.render(&pcm, 1.0, &mut out, Interpolation::Nearest);
        assert_eq!(&out[..37], &pcm[..]);
        assert!(out[37..].iter().all(|&s| s == 0.0));
        assert!(finished);
    }

    #[test]
    fn loop_wraps_inside_the_region() {
        let pcm = ramp(8);
        let mut osc = WavetableOscillator::new(&sample(8, 4, 8), SR, &generators(1));
        let mut out = vec![0.0; 12];
        assert!(!osc.render(&pcm, 1.0, &mut out, Interpolation::Nearest));
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn linear_blends_neighbours() {
        let pcm = ramp(16);
        let mut osc = WavetableOscillator::new(&sample(16, 0, 0), SR, &generators(0));
        let mut out = vec![0.0; 4];
        osc.render(&pcm, 0.5, &mut out, Interpolation::Linear);
        for (i, &s) in out.iter().enumerate() {
            assert_abs_diff_eq!(s, i as f32 * 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn cubic_is_exact_on_a_line() {
        let pcm = ramp(32);
        let mut osc = WavetableOscillator::new(&sample(32, 0, 0), SR, &generators(0));
        osc.seek(4.0, 1.0);
        let mut out = vec![0.0; 8];
        osc.render(&pcm, 0.25, &mut out, Interpolation::Cubic);
        for (i, &s) in out.iter().enumerate() {
            assert_abs_diff_eq!(s, 4.0 + i as f32 * 0.25, epsilon = 1e-4);
        }
    }

    #[test]
    fn loop_until_release_runs_out_the_tail() {
        let pcm = ramp(8);
        let mut osc = WavetableOscillator::new(&sample(8, 2, 6), SR, &generators(3));
        let mut out = vec![0.0; 10];
        assert!(!osc.render(&pcm, 1.0, &mut out, Interpolation::Nearest));
        osc.stop_looping();
        let mut tail = vec![0.0; 10];
        assert!(osc.render(&pcm, 1.0, &mut tail, Interpolation::Nearest));
        // the cursor sits at the loop end, so the tail plays 6 and 7
        assert_eq!(&tail[..3], &[6.0, 7.0, 0.0]);
    }

    #[test]
    fn mode_two_does_not_loop() {
        let osc = WavetableOscillator::new(&sample(8, 2, 6), SR, &generators(2));
        assert!(!osc.is_looping());
        assert_eq!(osc.mode(), LoopMode::NoLoop);
    }

    #[test]
    fn offsets_move_and_clamp_points() {
        let mut g = generators(1);
        g[GeneratorType::StartAddrsOffset.index()] = 3;
        g[GeneratorType::EndAddrsOffset.index()] = 500;
        g[GeneratorType::StartLoopAddrsOffset.index()] = 10;
        g[GeneratorType::EndLoopAddrsOffset.index()] = -10;
        let osc = WavetableOscillator::new(&sample(100, 20, 60), SR, &g);
        let region = osc.region();
        assert_eq!(region.start, 3);
        assert_eq!(region.end, 100);
        assert_eq!((region.loop_start, region.loop_end), (30, 50));
        assert_eq!(osc.cursor(), 3.0);
    }

    #[test]
    fn reversed_loops_swap_and_empty_loops_disable() {
        let mut g = generators(1);
        g[GeneratorType::StartLoopAddrsOffset.index()] = 50;
        let osc = WavetableOscillator::new(&sample(100, 20, 60), SR, &g);
        assert_eq!((osc.region().loop_start, osc.region().loop_end), (60, 70));
        assert!(osc.is_looping());

        let osc = WavetableOscillator::new(&sample(100, 40, 40), SR, &generators(1));
        assert!(!osc.is_looping());
    }

    #[test]
    fn playback_step_tracks_rates_and_correction() {
        let s = sample(10, 0, 0);
        let osc = WavetableOscillator::new(&s, 22_050.0, &generators(0));
        assert_abs_diff_eq!(osc.playback_step(), 2.0);
        let mut corrected = s.clone();
        corrected.pitch_correction = -50;
        let osc = WavetableOscillator::new(&corrected, SR, &generators(0));
        assert_abs_diff_eq!(osc.playback_step(), 2f64.powf(-50.0 / 1200.0), epsilon = 1e-12);
    }

    #[test]
    fn seek_wraps_or_finishes() {
        let mut looped = WavetableOscillator::new(&sample(8, 4, 8), SR, &generators(1));
        assert!(!looped.seek(13.0, 1.0));
        assert_abs_diff_eq!(looped.cursor(), 5.0);

        let mut once = WavetableOscillator::new(&sample(8, 0, 0), SR, &generators(0));
        assert!(once.seek(9.0, 1.0));
    }
}
