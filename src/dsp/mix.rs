//! Stereo panning and effect-send mixing.

/*
Voice Mixdown
=============

Each voice renders mono. The last step spreads that block onto the stereo
output and, optionally, onto two effect buses.

Vocabulary
----------

  pan           Generator value -500 (hard left) .. +500 (hard right).

  equal-power   Left/right gains on a quarter circle so loudness stays
                constant across the stereo field:
                    p     = (pan + 500) / 1000
                    left  = cos(p * π/2)
                    right = sin(p * π/2)
                Centre gives 0.707 on both sides, not 0.5.

  balance       Master pan (-1 .. 1). Attenuates the opposite side only,
                so centre leaves the mix untouched:
                    left  *= min(1, 1 - master_pan)
                    right *= min(1, 1 + master_pan)

  send          A copy of the voice fed to an effect bus. The generator
                value is in 0.1 % units (0 .. 1000).


Smoothing
---------

The pan moves toward its modulated target by 5 % per block. A CC10 sweep
then glides instead of stepping, which would click.


Buses
-----

    dry      stereo, equal-power pan, master gain and balance
    reverb   mono send, same level on both sides   gain * send / 4600
    chorus   stereo send, follows the pan          pan_gain * send / 2000

The dividers scale a full send down to a level that suits a typical reverb
or chorus input. With effects disabled both sends are skipped.
*/

use std::f32::consts::FRAC_PI_2;
use std::ops::Range;

/// Per-block glide of the pan toward its modulated value.
pub const PAN_SMOOTHING_FACTOR: f32 = 0.05;
pub const REVERB_DIVIDER: f32 = 4600.0;
pub const CHORUS_DIVIDER: f32 = 2000.0;

const MAX_PAN: f32 = 500.0;

/// Equal-power (left, right) gains for a pan in -500 .. 500.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let position = (pan.clamp(-MAX_PAN, MAX_PAN) + MAX_PAN) / (2.0 * MAX_PAN);
    let angle = FRAC_PI_2 * position;
    (angle.cos(), angle.sin())
}

/// Balance-law (left, right) multipliers for a master pan in -1 .. 1.
#[inline]
pub fn master_balance(master_pan: f32) -> (f32, f32) {
    let master_pan = master_pan.clamp(-1.0, 1.0);
    ((1.0 - master_pan).min(1.0), (1.0 + master_pan).min(1.0))
}

/// A left/right pair of accumulation buffers.
pub struct StereoBus<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

impl<'a> StereoBus<'a> {
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        Self { left, right }
    }

    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fill(&mut self, value: f32) {
        self.left.fill(value);
        self.right.fill(value);
    }

    fn slice(&mut self, range: Range<usize>) -> StereoBus<'_> {
        StereoBus {
            left: &mut self.left[range.clone()],
            right: &mut self.right[range],
        }
    }
}

/// Everything one render call writes into. Voices are added on top of
/// whatever the buffers already hold.
pub struct RenderOutput<'a> {
    pub dry: StereoBus<'a>,
    pub reverb: Option<StereoBus<'a>>,
    pub chorus: Option<StereoBus<'a>>,
}

impl<'a> RenderOutput<'a> {
    /// Dry output only; effect sends are dropped.
    pub fn stereo(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        Self {
            dry: StereoBus::new(left, right),
            reverb: None,
            chorus: None,
        }
    }

    pub fn with_effects(dry: StereoBus<'a>, reverb: StereoBus<'a>, chorus: StereoBus<'a>) -> Self {
        Self {
            dry,
            reverb: Some(reverb),
            chorus: Some(chorus),
        }
    }

    /// Frames every bus can hold.
    pub fn len(&self) -> usize {
        [self.reverb.as_ref(), self.chorus.as_ref()]
            .into_iter()
            .flatten()
            .fold(self.dry.len(), |len, bus| len.min(bus.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zeroes every bus.
    pub fn clear(&mut self) {
        self.dry.fill(0.0);
        if let Some(bus) = self.reverb.as_mut() {
            bus.fill(0.0);
        }
        if let Some(bus) = self.chorus.as_mut() {
            bus.fill(0.0);
        }
    }

    pub(crate) fn slice(&mut self, range: Range<usize>) -> RenderOutput<'_> {
        RenderOutput {
            dry: self.dry.slice(range.clone()),
            reverb: self.reverb.as_mut().map(|bus| bus.slice(range.clone())),
            chorus: self.chorus.as_mut().map(|bus| bus.slice(range)),
        }
    }
}

/// Engine-wide mix parameters, identical for every voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    pub gain: f32,
    /// (left, right) from `master_balance`.
    pub balance: (f32, f32),
    pub effects_enabled: bool,
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            balance: (1.0, 1.0),
            effects_enabled: true,
        }
    }
}

/// Per-voice generator inputs of the mixdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSends {
    pub pan: i32,
    pub reverb: i32,
    pub chorus: i32,
}

/// Smoothed pan state of one voice.
#[derive(Debug, Clone, Default)]
pub struct StereoPanner {
    current_pan: f32,
    initialized: bool,
}

impl StereoPanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_pan(&self) -> f32 {
        self.current_pan
    }

    /// Adds a mono voice block to `out`.
    pub fn mix(&mut self, input: &[f32], sends: VoiceSends, params: &MixParams, out: &mut RenderOutput<'_>) {
        let target = (sends.pan as f32).clamp(-MAX_PAN, MAX_PAN);
        if self.initialized {
            self.current_pan += (target - self.current_pan) * PAN_SMOOTHING_FACTOR;
        } else {
            self.initialized = true;
            self.current_pan = target;
        }

        let (pan_left, pan_right) = pan_gains(self.current_pan);
        let gain_left = pan_left * params.gain * params.balance.0;
        let gain_right = pan_right * params.gain * params.balance.1;

        if params.effects_enabled {
            if let Some(reverb) = out.reverb.as_mut().filter(|_| sends.reverb > 0) {
                let level = params.gain * sends.reverb as f32 / REVERB_DIVIDER;
                for ((l, r), &s) in reverb.left.iter_mut().zip(reverb.right.iter_mut()).zip(input) {
                    *l += level * s;
                    *r += level * s;
                }
            }
            if let Some(chorus) = out.chorus.as_mut().filter(|_| sends.chorus > 0) {
                let level = sends.chorus as f32 / CHORUS_DIVIDER;
                accumulate(chorus.left, input, gain_left * level);
                accumulate(chorus.right, input, gain_right * level);
            }
        }

        if gain_left > 0.0 {
            accumulate(out.dry.left, input, gain_left);
        }
        if gain_right > 0.0 {
            accumulate(out.dry.right, input, gain_right);
        }
    }
}

#[inline]
fn accumulate(out: &mut [f32], input: &[f32], gain: f32) {
    for (o, &s) in out.iter_mut().zip(input) {
        *o += gain * s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pan_law_is_equal_power() {
        let (l, r) = pan_gains(0.0);
        assert_abs_diff_eq!(l, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_abs_diff_eq!(r, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        let (l, r) = pan_gains(-500.0);
        assert_abs_diff_eq!(l, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r, 0.0, epsilon = 1e-6);
        for pan in [-400.0, -120.0, 33.0, 250.0] {
            let (l, r) = pan_gains(pan);
            assert_abs_diff_eq!(l * l + r * r, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn balance_only_cuts_the_far_side() {
        assert_eq!(master_balance(0.0), (1.0, 1.0));
        assert_eq!(master_balance(0.5), (0.5, 1.0));
        assert_eq!(master_balance(-1.0), (1.0, 0.0));
    }

    #[test]
    fn first_block_jumps_then_glides() {
        let mut panner = StereoPanner::new();
        let (mut l, mut r) = (vec![0.0; 4], vec![0.0; 4]);
        let input = [1.0; 4];
        let sends = VoiceSends { pan: 500, reverb: 0, chorus: 0 };
        panner.mix(&input, sends, &MixParams::default(), &mut RenderOutput::stereo(&mut l, &mut r));
        assert_eq!(panner.current_pan(), 500.0);
        assert!(l.iter().all(|&s| s.abs() < 1e-6));

        let sends = VoiceSends { pan: -500, ..sends };
        panner.mix(&input, sends, &MixParams::default(), &mut RenderOutput::stereo(&mut l, &mut r));
        assert_abs_diff_eq!(panner.current_pan(), 450.0);
    }

    #[test]
    fn sends_follow_their_dividers() {
        let mut panner = StereoPanner::new();
        let mut bufs = vec![vec![0.0f32; 2]; 6];
        let [dl, dr, rl, rr, cl, cr] = &mut bufs[..] else {
            unreachable!()
        };
        let mut out = RenderOutput::with_effects(
            StereoBus::new(dl, dr),
            StereoBus::new(rl, rr),
            StereoBus::new(cl, cr),
        );
        let sends = VoiceSends { pan: 0, reverb: 460, chorus: 200 };
        panner.mix(&[1.0, 1.0], sends, &MixParams::default(), &mut out);
        assert_abs_diff_eq!(out.reverb.as_ref().map_or(0.0, |b| b.left[0]), 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(out.reverb.as_ref().map_or(0.0, |b| b.right[1]), 0.1, epsilon = 1e-6);
        let chorus = std::f32::consts::FRAC_1_SQRT_2 * 0.1;
        assert_abs_diff_eq!(out.chorus.as_ref().map_or(0.0, |b| b.left[0]), chorus, epsilon = 1e-6);
    }

    #[test]
    fn disabled_effects_leave_sends_silent() {
        let mut panner = StereoPanner::new();
        let mut bufs = vec![vec![0.0f32; 2]; 6];
        let [dl, dr, rl, rr, cl, cr] = &mut bufs[..] else {
            unreachable!()
        };
        let mut out = RenderOutput::with_effects(
            StereoBus::new(dl, dr),
            StereoBus::new(rl, rr),
            StereoBus::new(cl, cr),
        );
        let params = MixParams {
            effects_enabled: false,
            ..MixParams::default()
        };
        panner.mix(&[1.0, 1.0], VoiceSends { pan: 0, reverb: 1000, chorus: 1000 }, &params, &mut out);
        assert!(out.reverb.as_ref().is_some_and(|b| b.left.iter().all(|&s| s == 0.0)));
        assert!(out.dry.left[0] > 0.7);
    }

    #[test]
    fn slices_address_the_same_memory() {
        let (mut l, mut r) = (vec![0.0; 8], vec![0.0; 8]);
        let mut out = RenderOutput::stereo(&mut l, &mut r);
        {
            let mut part = out.slice(4..8);
            part.dry.fill(1.0);
        }
        assert_eq!(out.len(), 8);
        drop(out);
        assert_eq!(&l[..], &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }
}
