use std::sync::Arc;

use rtrb::{Consumer, Producer};

use crate::bank::InstrumentBank;
use crate::dsp::oscillator::Interpolation;
use crate::error::{Error, Result};

use super::message::{SynthEvent, SynthMessage};

/// Control-side end of a `Synthesizer`.
///
/// Every send is non-blocking and fails with `Error::QueueFull` when the
/// render side has fallen behind.
pub struct SynthHandle {
    tx: Producer<SynthMessage>,
    events: Consumer<SynthEvent>,
}

impl SynthHandle {
    pub(crate) fn new(tx: Producer<SynthMessage>, events: Consumer<SynthEvent>) -> Self {
        Self { tx, events }
    }

    pub fn send(&mut self, message: SynthMessage) -> Result<()> {
        self.tx.push(message).map_err(|_| Error::QueueFull)
    }

    /// Messages that still fit in the queue.
    pub fn free_slots(&self) -> usize {
        self.tx.slots()
    }

    pub fn poll_event(&mut self) -> Option<SynthEvent> {
        self.events.pop().ok()
    }

    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(SynthMessage::NoteOn { channel, note, velocity })
    }

    pub fn note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        self.send(SynthMessage::NoteOff { channel, note })
    }

    pub fn kill_note(&mut self, channel: u8, note: u8) -> Result<()> {
        self.send(SynthMessage::KillNote { channel, note })
    }

    pub fn controller_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()> {
        self.send(SynthMessage::ControllerChange {
            channel,
            controller,
            value,
        })
    }

    pub fn program_change(&mut self, channel: u8, program: u8) -> Result<()> {
        self.send(SynthMessage::ProgramChange { channel, program })
    }

    /// 14-bit pitch wheel value, 8192 is centre.
    pub fn pitch_wheel(&mut self, channel: u8, value: u16) -> Result<()> {
        let value = value.min(16383);
        self.send(SynthMessage::PitchWheel {
            channel,
            msb: (value >> 7) as u8,
            lsb: (value & 0x7F) as u8,
        })
    }

    pub fn set_vibrato(&mut self, channel: u8, depth: f32, rate: f32, delay: f32) -> Result<()> {
        self.send(SynthMessage::SetVibrato {
            channel,
            depth,
            rate,
            delay,
        })
    }

    pub fn set_channel_tuning(&mut self, channel: u8, cents: f32) -> Result<()> {
        self.send(SynthMessage::SetChannelTuning { channel, cents })
    }

    pub fn stop_all(&mut self, channel: Option<u8>, force: bool) -> Result<()> {
        self.send(SynthMessage::StopAll { channel, force })
    }

    pub fn sample_dump(&mut self, sample: usize, pcm: Arc<[f32]>) -> Result<()> {
        self.send(SynthMessage::SampleDump { sample, pcm })
    }

    pub fn set_master_gain(&mut self, gain: f32) -> Result<()> {
        self.send(SynthMessage::SetMasterGain(gain))
    }

    pub fn set_master_pan(&mut self, pan: f32) -> Result<()> {
        self.send(SynthMessage::SetMasterPan(pan))
    }

    pub fn set_voice_cap(&mut self, cap: usize) -> Result<()> {
        self.send(SynthMessage::SetVoiceCap(cap))
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) -> Result<()> {
        self.send(SynthMessage::SetInterpolation(interpolation))
    }

    /// The previous bank comes back through `poll_event`.
    pub fn set_bank(&mut self, mut bank: InstrumentBank) -> Result<()> {
        bank.prepare_layers();
        self.send(SynthMessage::SetBank(Box::new(bank)))
    }
}
