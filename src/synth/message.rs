use std::sync::Arc;

#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::bank::InstrumentBank;
use crate::dsp::oscillator::Interpolation;
use crate::MIDI_CHANNEL_COUNT;

/// Control → render messages. Channels and notes are plain MIDI numbers;
/// out-of-range values are ignored on the render side.
#[derive(Debug)]
pub enum SynthMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    /// Near-instant release of every voice playing `note`.
    KillNote { channel: u8, note: u8 },
    ControllerChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchWheel { channel: u8, msb: u8, lsb: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    /// Channel vibrato: cents, Hz, seconds.
    SetVibrato { channel: u8, depth: f32, rate: f32, delay: f32 },
    SetChannelTuning { channel: u8, cents: f32 },
    SetChannelTranspose { channel: u8, semitones: i32, cents: f32 },
    SetModulationMultiplier { channel: u8, multiplier: f32 },
    LockController { channel: u8, controller: u8, locked: bool },
    ResetControllers { channel: u8 },
    /// `None` stops every channel. `force` cuts voices instead of releasing them.
    StopAll { channel: Option<u8>, force: bool },
    /// PCM for a sample whose audio was decoded out of band.
    SampleDump { sample: usize, pcm: Arc<[f32]> },
    SetMasterGain(f32),
    /// -1 (left) .. 1 (right).
    SetMasterPan(f32),
    /// Cents.
    SetMasterTuning(f32),
    SetVoiceCap(usize),
    SetEffectsEnabled(bool),
    SetInterpolation(Interpolation),
    /// Replaces the bank. The old one comes back as `SynthEvent::BankReleased`.
    SetBank(Box<InstrumentBank>),
    DumpNote { channel: u8, note: u8, velocity: u8 },
}

/// Render → control notifications.
#[derive(Debug)]
pub enum SynthEvent {
    /// Live voices after a block.
    VoiceCount {
        total: usize,
        per_channel: [u16; MIDI_CHANNEL_COUNT],
    },
    /// The last voice of a note has stopped.
    NoteFinished { channel: u8, note: u8 },
    /// A replaced bank, handed back so it is freed off the audio thread.
    BankReleased(Box<InstrumentBank>),
    NoteDump(String),
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
