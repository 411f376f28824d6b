//! Precomputed modulator transform curves.

/*
Transform Curves
================

Every modulator source is a 14-bit value (0..16383) pushed through one of
sixteen curves before it is multiplied into the destination:

    4 shapes  x  2 polarities  x  2 directions

With x = raw / 16384 (and x = 1 - x when the direction is reversed):

    shape      unipolar (0..1)         bipolar (-1..1), v = 2x - 1
    linear     x                       v
    concave    x^e                     sign(v) * |v|^e
    convex     1 - (1 - x)^e           sign(v) * (1 - (1 - |v|)^e)
    switch     x > 0.5 ? 1 : 0         x > 0.5 ? 1 : -1

e is Euler's number. Any NaN produced along the way reads as 1.

Tables are filled once and looked up per modulator per block, so no pow()
runs on the audio thread.
*/

use std::f32::consts::E;

use crate::bank::modulator::{CurveType, SourceSpec};

/// Entries per curve table: one per 14-bit source value.
pub const CURVE_RESOLUTION: usize = 16384;

#[inline]
pub fn concave(x: f32) -> f32 {
    x.powf(E)
}

#[inline]
pub fn convex(x: f32) -> f32 {
    1.0 - (1.0 - x).powf(E)
}

/// Evaluates one curve at a normalized input in [0, 1].
pub fn curve_value(curve: CurveType, bipolar: bool, reversed: bool, x: f32) -> f32 {
    let x = if reversed { 1.0 - x } else { x };
    let shape = |v: f32| match curve {
        CurveType::Linear => v,
        CurveType::Concave => concave(v),
        CurveType::Convex => convex(v),
        CurveType::Switch => {
            if v > 0.5 {
                1.0
            } else {
                0.0
            }
        }
    };

    let value = if !bipolar {
        shape(x)
    } else if curve == CurveType::Switch {
        if x > 0.5 {
            1.0
        } else {
            -1.0
        }
    } else {
        let v = 2.0 * x - 1.0;
        if v < 0.0 {
            -shape(-v)
        } else {
            shape(v)
        }
    };

    if value.is_nan() {
        1.0
    } else {
        value
    }
}

/// All sixteen curve tables in one allocation.
#[derive(Debug, Clone)]
pub struct CurveTables {
    values: Box<[f32]>,
}

impl CurveTables {
    pub fn new() -> Self {
        let mut values = vec![0.0f32; 16 * CURVE_RESOLUTION].into_boxed_slice();
        for curve in CurveType::ALL {
            for bipolar in [false, true] {
                for reversed in [false, true] {
                    let base = Self::offset(curve, bipolar, reversed);
                    let table = &mut values[base..base + CURVE_RESOLUTION];
                    for (i, v) in table.iter_mut().enumerate() {
                        *v = curve_value(curve, bipolar, reversed, i as f32 / CURVE_RESOLUTION as f32);
                    }
                }
            }
        }
        Self { values }
    }

    #[inline]
    fn offset(curve: CurveType, bipolar: bool, reversed: bool) -> usize {
        ((curve as usize) * 4 + (bipolar as usize) * 2 + reversed as usize) * CURVE_RESOLUTION
    }

    /// Transformed value of a raw 14-bit source reading.
    #[inline]
    pub fn lookup(&self, spec: &SourceSpec, raw: u16) -> f32 {
        let index = (raw as usize).min(CURVE_RESOLUTION - 1);
        self.values[Self::offset(spec.curve, spec.bipolar, spec.reversed) + index]
    }
}

impl Default for CurveTables {
    fn default() -> Self {
        Self::new()
    }
}
