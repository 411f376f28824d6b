pub mod bank; // SoundFont data model and layer resolution
pub mod dsp;
pub mod error;
pub mod modulation; // Controllers, curves and modulator evaluation
pub mod synth; // Voices, channels and the render context

pub use bank::InstrumentBank;
pub use dsp::mix::{RenderOutput, StereoBus};
pub use error::{Error, Result};
#[cfg(feature = "rtrb")]
pub use synth::SynthHandle;
pub use synth::{SynthConfig, SynthEvent, SynthMessage, Synthesizer};

pub const MAX_BLOCK_SIZE: usize = 2048;
pub const MIDI_CHANNEL_COUNT: usize = 16;
/// Bank number of percussion presets.
pub const DRUM_BANK: u16 = 128;
