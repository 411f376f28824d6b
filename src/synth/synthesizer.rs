use std::mem;

#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, trace};

use crate::bank::InstrumentBank;
use crate::dsp::mix::{master_balance, MixParams, RenderOutput};
use crate::error::Result;
use crate::modulation::controllers::ChannelVibrato;
use crate::modulation::ModulatorEngine;
use crate::{MAX_BLOCK_SIZE, MIDI_CHANNEL_COUNT};

use super::channel::{Channel, ControlContext};
#[cfg(feature = "rtrb")]
use super::handle::SynthHandle;
#[cfg(feature = "rtrb")]
use super::message::MessageReceiver;
use super::message::{SynthEvent, SynthMessage};
use super::render::VoiceSynthesizer;
use super::stealing::enforce_voice_cap;
use super::voice::{Voice, VoiceCache};
use super::SynthConfig;

/// Note templates the voice cache holds before its table grows.
const VOICE_CACHE_NOTES: usize = 1024;

fn channel_mut(channels: &mut [Channel], index: u8) -> Option<&mut Channel> {
    channels.get_mut(index as usize)
}

/// Where events leave the render context.
enum EventOutlet {
    #[cfg(feature = "rtrb")]
    Queue(Producer<SynthEvent>),
    /// Bounded in-memory buffer, drained with `Synthesizer::take_events`.
    Buffer { events: Vec<SynthEvent>, capacity: usize },
}

impl EventOutlet {
    fn push(&mut self, event: SynthEvent) {
        match self {
            #[cfg(feature = "rtrb")]
            EventOutlet::Queue(tx) => {
                // a full queue drops the event
                let _ = tx.push(event);
            }
            EventOutlet::Buffer { events, capacity } => {
                if events.len() < *capacity {
                    events.push(event);
                }
            }
        }
    }
}

/// The render context: owns the bank, every channel and voice.
///
/// Control messages are applied at the start of `render_block`, or directly
/// through `apply` when the engine is driven from a single thread.
pub struct Synthesizer {
    config: SynthConfig,
    bank: Box<InstrumentBank>,
    cache: VoiceCache,
    engine: ModulatorEngine,
    channels: Vec<Channel>,
    renderer: VoiceSynthesizer,
    master_pan: f32,
    /// Seconds rendered so far.
    time: f64,
    #[cfg(feature = "rtrb")]
    rx: Option<Consumer<SynthMessage>>,
    events: EventOutlet,
}

impl Synthesizer {
    /// Creates the render context and the control handle that drives it.
    #[cfg(feature = "rtrb")]
    pub fn new(config: SynthConfig, bank: InstrumentBank) -> Result<(Self, SynthHandle)> {
        config.validate()?;
        let (msg_tx, msg_rx) = RingBuffer::<SynthMessage>::new(config.message_capacity);
        let (event_tx, event_rx) = RingBuffer::<SynthEvent>::new(config.event_capacity);
        let mut synth = Self::build(config, bank, EventOutlet::Queue(event_tx));
        synth.rx = Some(msg_rx);
        Ok((synth, SynthHandle::new(msg_tx, event_rx)))
    }

    /// A synthesizer without queues; drive it with `apply` and read events
    /// with `take_events`.
    pub fn standalone(config: SynthConfig, bank: InstrumentBank) -> Result<Self> {
        config.validate()?;
        let capacity = config.event_capacity;
        let outlet = EventOutlet::Buffer {
            events: Vec::with_capacity(capacity),
            capacity,
        };
        Ok(Self::build(config, bank, outlet))
    }

    fn build(config: SynthConfig, mut bank: InstrumentBank, events: EventOutlet) -> Self {
        bank.prepare_layers();
        let channels = (0..config.channel_count as u8)
            .map(|i| Channel::new(i, config.drum_channel == Some(i), &bank))
            .collect();
        let mix = MixParams {
            effects_enabled: config.effects_enabled,
            ..MixParams::default()
        };
        info!(
            sample_rate = config.sample_rate,
            channels = config.channel_count,
            voice_cap = config.voice_cap,
            presets = bank.presets().len(),
            "synthesizer created"
        );
        Self {
            renderer: VoiceSynthesizer::new(config.interpolation, mix),
            config,
            bank: Box::new(bank),
            cache: VoiceCache::with_capacity(VOICE_CACHE_NOTES),
            engine: ModulatorEngine::new(),
            channels,
            master_pan: 0.0,
            time: 0.0,
            #[cfg(feature = "rtrb")]
            rx: None,
            events,
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn bank(&self) -> &InstrumentBank {
        &self.bank
    }

    pub fn channel(&self, channel: u8) -> Option<&Channel> {
        self.channels.get(channel as usize)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Voices of a channel, empty for an unknown channel.
    pub fn voices(&self, channel: u8) -> &[Voice] {
        self.channel(channel).map(Channel::voices).unwrap_or_default()
    }

    pub fn voice_count(&self) -> usize {
        self.channels.iter().map(Channel::voice_count).sum()
    }

    pub fn master_gain(&self) -> f32 {
        self.renderer.mix.gain
    }

    pub fn master_pan(&self) -> f32 {
        self.master_pan
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Events collected by a standalone synthesizer. Always empty when the
    /// events go to a queue.
    pub fn take_events(&mut self) -> Vec<SynthEvent> {
        match &mut self.events {
            #[cfg(feature = "rtrb")]
            EventOutlet::Queue(_) => Vec::new(),
            EventOutlet::Buffer { events, capacity } => mem::replace(events, Vec::with_capacity(*capacity)),
        }
    }

    /// Applies one control message immediately, at the current render time.
    pub fn apply(&mut self, message: SynthMessage) {
        let ctx = ControlContext::new(&self.engine, &self.config, self.time);

        match message {
            SynthMessage::NoteOn { channel: c, note, velocity } => {
                if note > 127 {
                    return;
                }
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.note_on(&ctx, &mut self.bank, &mut self.cache, note, velocity);
                }
                self.enforce_voice_cap();
            }
            SynthMessage::NoteOff { channel: c, note } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.note_off(&ctx, note);
                }
            }
            SynthMessage::KillNote { channel: c, note } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.kill_note(&ctx, note);
                }
            }
            SynthMessage::ControllerChange {
                channel: c,
                controller,
                value,
            } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.controller_change(&ctx, controller, value);
                }
            }
            SynthMessage::ProgramChange { channel: c, program } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.program_change(&self.bank, program);
                }
            }
            SynthMessage::PitchWheel { channel: c, msb, lsb } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.pitch_wheel(&ctx, msb, lsb);
                }
            }
            SynthMessage::ChannelPressure { channel: c, pressure } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.channel_pressure(&ctx, pressure);
                }
            }
            SynthMessage::PolyPressure {
                channel: c,
                note,
                pressure,
            } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.poly_pressure(&ctx, note, pressure);
                }
            }
            SynthMessage::SetVibrato {
                channel: c,
                depth,
                rate,
                delay,
            } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.set_vibrato(ChannelVibrato { depth, rate, delay });
                }
            }
            SynthMessage::SetChannelTuning { channel: c, cents } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.custom_mut().tuning_cents = cents;
                }
            }
            SynthMessage::SetChannelTranspose {
                channel: c,
                semitones,
                cents,
            } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    let custom = ch.custom_mut();
                    custom.transpose_semitones = semitones;
                    custom.transpose_fine = cents;
                }
            }
            SynthMessage::SetModulationMultiplier { channel: c, multiplier } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.custom_mut().modulation_multiplier = multiplier;
                }
            }
            SynthMessage::LockController {
                channel: c,
                controller,
                locked,
            } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.lock_controller(controller, locked);
                }
            }
            SynthMessage::ResetControllers { channel: c } => {
                if let Some(ch) = channel_mut(&mut self.channels, c) {
                    ch.reset_controllers(&ctx);
                }
            }
            SynthMessage::StopAll { channel: c, force } => {
                match c {
                    Some(c) => {
                        if let Some(ch) = channel_mut(&mut self.channels, c) {
                            ch.stop_all(&ctx, force);
                        }
                    }
                    None => {
                        for ch in &mut self.channels {
                            ch.stop_all(&ctx, force);
                        }
                    }
                }
                if force {
                    self.remove_finished();
                }
            }
            SynthMessage::SampleDump { sample, pcm } => {
                if self.bank.install_sample_pcm(sample, pcm) {
                    debug!(sample, "sample data arrived");
                    if let Some(data) = self.bank.sample(sample) {
                        for ch in &mut self.channels {
                            ch.resume_sample(sample, data, ctx.time, ctx.sample_rate);
                        }
                    }
                } else {
                    debug!(sample, "sample dump for an unknown sample");
                }
            }
            SynthMessage::SetMasterGain(gain) => self.renderer.mix.gain = gain.max(0.0),
            SynthMessage::SetMasterPan(pan) => {
                self.master_pan = pan.clamp(-1.0, 1.0);
                self.renderer.mix.balance = master_balance(self.master_pan);
            }
            SynthMessage::SetMasterTuning(cents) => self.renderer.master_tuning = cents,
            SynthMessage::SetVoiceCap(cap) => {
                self.config.voice_cap = cap;
                self.enforce_voice_cap();
            }
            SynthMessage::SetEffectsEnabled(enabled) => {
                self.config.effects_enabled = enabled;
                self.renderer.mix.effects_enabled = enabled;
            }
            SynthMessage::SetInterpolation(interpolation) => {
                self.config.interpolation = interpolation;
                self.renderer.interpolation = interpolation;
            }
            SynthMessage::SetBank(bank) => self.replace_bank(bank),
            SynthMessage::DumpNote {
                channel: c,
                note,
                velocity,
            } => {
                if let Some(preset) = self.channel(c).map(Channel::preset) {
                    let dump = self.bank.dump_note(preset, note & 0x7F, velocity & 0x7F);
                    self.events.push(SynthEvent::NoteDump(dump.to_string()));
                }
            }
        }
    }

    fn replace_bank(&mut self, bank: Box<InstrumentBank>) {
        let ctx = ControlContext::new(&self.engine, &self.config, self.time);
        for ch in &mut self.channels {
            ch.stop_all(&ctx, true);
        }
        self.remove_finished();

        let old = mem::replace(&mut self.bank, bank);
        self.cache.clear();
        for ch in &mut self.channels {
            ch.refresh_preset(&self.bank);
        }
        debug!(presets = self.bank.presets().len(), "bank replaced");
        self.events.push(SynthEvent::BankReleased(old));
    }

    fn enforce_voice_cap(&mut self) {
        if enforce_voice_cap(&mut self.channels, self.config.voice_cap) > 0 {
            self.remove_finished();
        }
    }

    fn remove_finished(&mut self) {
        let Self { channels, events, .. } = self;
        for ch in channels.iter_mut() {
            let channel = ch.index();
            ch.remove_finished(|note| events.push(SynthEvent::NoteFinished { channel, note }));
        }
    }

    #[cfg(feature = "rtrb")]
    fn drain_messages(&mut self) {
        while let Some(message) = self.rx.as_mut().and_then(MessageReceiver::pop) {
            self.apply(message);
        }
    }

    /// Renders `out.len()` frames. Every bus is overwritten.
    pub fn render_block(&mut self, out: &mut RenderOutput<'_>) {
        #[cfg(feature = "rtrb")]
        self.drain_messages();

        out.clear();
        let frames = out.len();
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(MAX_BLOCK_SIZE);
            self.render_chunk(&mut out.slice(offset..offset + len));
            offset += len;
        }

        let mut per_channel = [0u16; MIDI_CHANNEL_COUNT];
        for (count, ch) in per_channel.iter_mut().zip(&self.channels) {
            *count = ch.voice_count() as u16;
        }
        let total = self.voice_count();
        trace!(frames, voices = total, "rendered block");
        self.events.push(SynthEvent::VoiceCount { total, per_channel });
    }

    fn render_chunk(&mut self, out: &mut RenderOutput<'_>) {
        for ch in &mut self.channels {
            ch.render(&mut self.renderer, &self.bank, self.time, out);
        }
        self.time += out.len() as f64 / self.config.sample_rate as f64;
        self.remove_finished();
    }
}
