//! Low-level DSP primitives of a SoundFont voice.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs. They stay focused on the signal math;
//! the synth layer decides when and with which generator values to call them.

/// Volume envelope (DAHDSR in the dB domain).
pub mod envelope;
/// Resonant 2-pole low-pass.
pub mod filter;
/// Triangle LFO evaluated from absolute time.
pub mod lfo;
/// Stereo panning and effect sends.
pub mod mix;
/// Modulation envelope (pitch and cutoff source).
pub mod mod_envelope;
/// Sample playback with loops and interpolation.
pub mod oscillator;
/// Timecents, absolute cents and centibels.
pub mod units;

pub use envelope::{EnvelopeState, VolumeEnvelope};
pub use filter::LowpassFilter;
pub use mix::{RenderOutput, StereoBus, StereoPanner};
pub use mod_envelope::ModulationEnvelope;
pub use oscillator::{Interpolation, WavetableOscillator};
