//! Voice management and the realtime render context.
//!
//! `Synthesizer` lives on the audio thread and owns everything it touches;
//! `SynthHandle` is the control-side end of its queues.

pub mod channel;
pub mod config;
#[cfg(feature = "rtrb")]
pub mod handle;
pub mod message;
pub mod render;
pub mod stealing;
pub mod synthesizer;
pub mod voice;

pub use channel::Channel;
pub use config::SynthConfig;
#[cfg(feature = "rtrb")]
pub use handle::SynthHandle;
pub use message::{SynthEvent, SynthMessage};
pub use synthesizer::Synthesizer;
pub use voice::{Voice, VoiceCache};
