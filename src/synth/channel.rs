use tracing::debug;

use crate::bank::modulator::{GeneralSource, SourceKind};
use crate::bank::sample::Sample;
use crate::bank::InstrumentBank;
use crate::dsp::mix::RenderOutput;
use crate::modulation::controllers::{cc, ChannelVibrato, ControllerSlot, ControllerTable, CustomControllers};
use crate::modulation::ModulatorEngine;
use crate::DRUM_BANK;

use super::config::SynthConfig;
use super::render::VoiceSynthesizer;
use super::voice::{Voice, VoiceCache};

/// Engine state every channel operation may read.
#[derive(Clone, Copy)]
pub(crate) struct ControlContext<'a> {
    pub engine: &'a ModulatorEngine,
    /// Seconds since the engine started.
    pub time: f64,
    pub sample_rate: f32,
    pub min_note_length: f64,
}

impl<'a> ControlContext<'a> {
    pub fn new(engine: &'a ModulatorEngine, config: &SynthConfig, time: f64) -> Self {
        Self {
            engine,
            time,
            sample_rate: config.sample_rate,
            min_note_length: config.min_note_length,
        }
    }
}

/// What the data entry controllers currently address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataEntry {
    Idle,
    Rpn,
    Nrpn,
}

const RPN_PITCH_WHEEL_RANGE: u16 = 0x0000;
const RPN_FINE_TUNING: u16 = 0x0001;
const RPN_COARSE_TUNING: u16 = 0x0002;
const RPN_MODULATION_DEPTH: u16 = 0x0005;

/// Cents of vibrato depth at a multiplier of 1.
const DEFAULT_MODULATION_DEPTH_CENTS: f32 = 50.0;

/// One MIDI channel: controller state, preset selection and its voices.
#[derive(Debug, Clone)]
pub struct Channel {
    index: u8,
    controllers: ControllerTable,
    custom: CustomControllers,
    vibrato: ChannelVibrato,
    bank_select: u16,
    program: u8,
    preset: usize,
    drum: bool,
    hold_pedal: bool,
    data_entry: DataEntry,
    pub(crate) voices: Vec<Voice>,
}

impl Channel {
    pub fn new(index: u8, drum: bool, bank: &InstrumentBank) -> Self {
        let bank_select = if drum { DRUM_BANK } else { 0 };
        Self {
            index,
            controllers: ControllerTable::new(),
            custom: CustomControllers::default(),
            vibrato: ChannelVibrato::default(),
            bank_select,
            program: 0,
            preset: bank.preset_index(bank_select, 0),
            drum,
            hold_pedal: false,
            data_entry: DataEntry::Idle,
            voices: Vec::new(),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_drum(&self) -> bool {
        self.drum
    }

    pub fn bank_select(&self) -> u16 {
        self.bank_select
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    /// Index of the preset in the current bank, after fallback.
    pub fn preset(&self) -> usize {
        self.preset
    }

    pub fn hold_pedal(&self) -> bool {
        self.hold_pedal
    }

    pub fn controllers(&self) -> &ControllerTable {
        &self.controllers
    }

    pub fn custom(&self) -> &CustomControllers {
        &self.custom
    }

    pub fn custom_mut(&mut self) -> &mut CustomControllers {
        &mut self.custom
    }

    pub fn vibrato(&self) -> &ChannelVibrato {
        &self.vibrato
    }

    pub fn set_vibrato(&mut self, vibrato: ChannelVibrato) {
        self.vibrato = vibrato;
    }

    pub fn lock_controller(&mut self, controller: u8, locked: bool) {
        self.controllers.lock(controller, locked);
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices still sounding.
    pub fn voice_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_finished()).count()
    }

    fn key(&self, note: u8) -> Option<u8> {
        let key = note as i32 + self.custom.transpose_semitones;
        (0..=127).contains(&key).then_some(key as u8)
    }

    /// Starts the voices of a note. Velocity 0 is a note-off.
    pub(crate) fn note_on(
        &mut self,
        ctx: &ControlContext<'_>,
        bank: &mut InstrumentBank,
        cache: &mut VoiceCache,
        note: u8,
        velocity: u8,
    ) {
        if velocity == 0 {
            self.note_off(ctx, note);
            return;
        }
        let Some(key) = self.key(note) else {
            return;
        };
        let velocity = velocity.min(127);

        let templates = cache.voices(bank, self.preset, key, velocity, ctx.sample_rate);
        for class in templates.iter().map(Voice::exclusive_class).filter(|&c| c != 0) {
            for voice in self
                .voices
                .iter_mut()
                .filter(|v| v.exclusive_class == class && !v.finished)
            {
                voice.exclusive_release(ctx.time);
            }
        }

        let first = self.voices.len();
        self.voices.extend_from_slice(templates);
        for voice in &mut self.voices[first..] {
            match bank.sample(voice.sample) {
                Some(sample) => voice.start(
                    self.index,
                    key,
                    ctx.time,
                    sample,
                    ctx.sample_rate,
                    ctx.engine,
                    &self.controllers,
                ),
                None => voice.finished = true,
            }
        }
    }

    /// Releases a note, or marks it sustained while the hold pedal is down.
    pub(crate) fn note_off(&mut self, ctx: &ControlContext<'_>, note: u8) {
        let Some(key) = self.key(note) else {
            return;
        };
        let hold = self.hold_pedal;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.midi_note == key && !v.is_in_release() && !v.finished)
        {
            if hold {
                voice.set_sustained();
            } else {
                voice.release(ctx.time, ctx.min_note_length);
            }
        }
    }

    pub(crate) fn kill_note(&mut self, ctx: &ControlContext<'_>, note: u8) {
        let Some(key) = self.key(note) else {
            return;
        };
        for voice in self.voices.iter_mut().filter(|v| v.midi_note == key) {
            voice.kill(ctx.time);
        }
    }

    /// `force` marks every voice finished; otherwise they are released.
    pub(crate) fn stop_all(&mut self, ctx: &ControlContext<'_>, force: bool) {
        for voice in &mut self.voices {
            if force {
                voice.finished = true;
            } else if !voice.is_in_release() {
                voice.release(ctx.time, ctx.min_note_length);
            }
        }
    }

    fn update_source(&mut self, ctx: &ControlContext<'_>, source: SourceKind) {
        for voice in &mut self.voices {
            voice.update_source(ctx.engine, &self.controllers, source);
        }
    }

    fn set_hold_pedal(&mut self, ctx: &ControlContext<'_>, down: bool) {
        self.hold_pedal = down;
        if !down {
            for voice in self.voices.iter_mut().filter(|v| v.is_sustained()) {
                voice.release(ctx.time, ctx.min_note_length);
            }
        }
    }

    pub(crate) fn controller_change(&mut self, ctx: &ControlContext<'_>, controller: u8, value: u8) {
        let (controller, value) = (controller & 0x7F, value & 0x7F);
        if self.controllers.is_locked(controller) {
            return;
        }
        match controller {
            cc::ALL_SOUND_OFF => self.stop_all(ctx, true),
            cc::ALL_NOTES_OFF => self.stop_all(ctx, false),
            cc::RESET_ALL_CONTROLLERS => self.reset_controllers(ctx),
            cc::BANK_SELECT => {
                self.controllers.set_cc(controller, value);
                if !self.drum {
                    self.bank_select = value as u16;
                }
            }
            cc::SUSTAIN_PEDAL => {
                self.controllers.set_cc(controller, value);
                self.update_source(ctx, SourceKind::Controller(controller));
                self.set_hold_pedal(ctx, value >= 64);
            }
            cc::RPN_MSB | cc::RPN_LSB => {
                self.controllers.set_cc(controller, value);
                self.data_entry = if self.rpn() == 0x3FFF {
                    DataEntry::Idle
                } else {
                    DataEntry::Rpn
                };
            }
            cc::NRPN_MSB | cc::NRPN_LSB => {
                self.controllers.set_cc(controller, value);
                self.data_entry = DataEntry::Nrpn;
            }
            cc::DATA_ENTRY_MSB if self.data_entry == DataEntry::Rpn => {
                self.controllers.set_cc(controller, value);
                self.data_entry_msb(ctx, value);
            }
            cc::DATA_ENTRY_LSB if self.data_entry == DataEntry::Rpn => self.data_entry_lsb(ctx, value),
            cc::LSB_FIRST..=cc::LSB_LAST if controller != cc::DATA_ENTRY_LSB => {
                let msb = controller - 32;
                self.controllers.set_lsb(msb, value);
                self.update_source(ctx, SourceKind::Controller(msb));
            }
            _ => {
                self.controllers.set_cc(controller, value);
                self.update_source(ctx, SourceKind::Controller(controller));
            }
        }
    }

    fn rpn(&self) -> u16 {
        (self.controllers.cc(cc::RPN_MSB) as u16) << 7 | self.controllers.cc(cc::RPN_LSB) as u16
    }

    fn data_entry_msb(&mut self, ctx: &ControlContext<'_>, value: u8) {
        match self.rpn() {
            RPN_PITCH_WHEEL_RANGE => {
                self.controllers.set(ControllerSlot::PitchWheelRange, (value as u16) << 7);
                self.update_source(ctx, SourceKind::General(GeneralSource::PitchWheelRange));
            }
            RPN_FINE_TUNING => {
                let raw = (value as i32) << 7;
                self.custom.tuning_cents = (raw - 8192) as f32 / 8192.0 * 100.0;
            }
            RPN_COARSE_TUNING => self.custom.tuning_semitones = value as i32 - 64,
            RPN_MODULATION_DEPTH => {
                self.custom.modulation_multiplier = value as f32 * 100.0 / DEFAULT_MODULATION_DEPTH_CENTS;
            }
            other => debug!(channel = self.index, rpn = other, "unsupported RPN"),
        }
    }

    fn data_entry_lsb(&mut self, ctx: &ControlContext<'_>, value: u8) {
        match self.rpn() {
            RPN_PITCH_WHEEL_RANGE if value != 0 => {
                let range = self.controllers.get(ControllerSlot::PitchWheelRange) | value as u16;
                self.controllers.set(ControllerSlot::PitchWheelRange, range);
                self.update_source(ctx, SourceKind::General(GeneralSource::PitchWheelRange));
            }
            RPN_FINE_TUNING => {
                let raw = (self.controllers.get(ControllerSlot::Cc(cc::DATA_ENTRY_MSB)) | value as u16) as i32;
                self.custom.tuning_cents = (raw - 8192) as f32 / 8192.0 * 100.0;
            }
            RPN_MODULATION_DEPTH => {
                let cents = self.custom.modulation_multiplier * DEFAULT_MODULATION_DEPTH_CENTS
                    + value as f32 / 128.0 * 100.0;
                self.custom.modulation_multiplier = cents / DEFAULT_MODULATION_DEPTH_CENTS;
            }
            _ => {}
        }
    }

    /// Restores controller defaults and re-evaluates every voice.
    pub(crate) fn reset_controllers(&mut self, ctx: &ControlContext<'_>) {
        self.controllers.reset();
        self.data_entry = DataEntry::Idle;
        self.set_hold_pedal(ctx, false);
        for voice in &mut self.voices {
            voice.update_all_sources(ctx.engine, &self.controllers);
        }
    }

    pub(crate) fn pitch_wheel(&mut self, ctx: &ControlContext<'_>, msb: u8, lsb: u8) {
        let value = ((msb & 0x7F) as u16) << 7 | (lsb & 0x7F) as u16;
        self.controllers.set(ControllerSlot::PitchWheel, value);
        self.update_source(ctx, SourceKind::General(GeneralSource::PitchWheel));
    }

    pub(crate) fn channel_pressure(&mut self, ctx: &ControlContext<'_>, pressure: u8) {
        self.controllers
            .set(ControllerSlot::ChannelPressure, ((pressure & 0x7F) as u16) << 7);
        self.update_source(ctx, SourceKind::General(GeneralSource::ChannelPressure));
    }

    pub(crate) fn poly_pressure(&mut self, ctx: &ControlContext<'_>, note: u8, pressure: u8) {
        let Some(key) = self.key(note) else {
            return;
        };
        let source = SourceKind::General(GeneralSource::PolyPressure);
        for voice in self.voices.iter_mut().filter(|v| v.midi_note == key) {
            voice.poly_pressure = pressure & 0x7F;
            voice.update_source(ctx.engine, &self.controllers, source);
        }
    }

    pub(crate) fn program_change(&mut self, bank: &InstrumentBank, program: u8) {
        self.program = program & 0x7F;
        self.refresh_preset(bank);
        debug!(
            channel = self.index,
            bank = self.bank_select,
            program = self.program,
            preset = self.preset,
            "program change"
        );
    }

    /// Looks the preset up again, e.g. after the bank was replaced.
    pub(crate) fn refresh_preset(&mut self, bank: &InstrumentBank) {
        self.preset = bank.preset_index(self.bank_select, self.program);
    }

    /// Re-positions voices of `sample` whose PCM just arrived.
    pub(crate) fn resume_sample(&mut self, index: usize, sample: &Sample, time: f64, sample_rate: f32) {
        for voice in self.voices.iter_mut().filter(|v| v.sample == index) {
            voice.resume_at(sample, time, sample_rate);
        }
    }

    /// Adds every voice to `out`, starting due releases first.
    pub(crate) fn render(
        &mut self,
        renderer: &mut VoiceSynthesizer,
        bank: &InstrumentBank,
        time: f64,
        out: &mut RenderOutput<'_>,
    ) {
        for voice in &mut self.voices {
            voice.begin_release_if_due(time);
            let pcm = bank.sample(voice.sample).and_then(|s| s.pcm()).map(|pcm| &pcm[..]);
            renderer.render_voice(voice, pcm, &self.custom, &self.vibrato, time, out);
        }
    }

    /// Drops finished voices. `on_note_finished` gets every note that has
    /// no live voice left.
    pub(crate) fn remove_finished(&mut self, mut on_note_finished: impl FnMut(u8)) {
        let voices = &self.voices;
        for (i, voice) in voices.iter().enumerate().filter(|(_, v)| v.finished) {
            let note = voice.midi_note;
            let reported = voices[..i].iter().any(|v| v.finished && v.midi_note == note);
            let alive = voices.iter().any(|v| !v.finished && v.midi_note == note);
            if !reported && !alive {
                on_note_finished(note);
            }
        }
        self.voices.retain(|v| !v.finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::generator::GeneratorType;
    use crate::bank::parts::{BankBuilder, ZoneBuilder};

    fn bank() -> InstrumentBank {
        let mut builder = BankBuilder::new("channel");
        let pcm = vec![0.25; 4800];
        let s = builder.add_looped_sample("tone", &pcm, 48_000, 60, 100, 4700);
        let hat = builder.add_instrument(
            "hat",
            vec![ZoneBuilder::sample(s)
                .generator(GeneratorType::ExclusiveClass, 5)
                .generator(GeneratorType::SampleModes, 1)],
        );
        let pad = builder.add_instrument(
            "pad",
            vec![ZoneBuilder::sample(s).generator(GeneratorType::SampleModes, 1)],
        );
        builder.add_preset("pad", 0, 0, vec![ZoneBuilder::instrument(pad)]);
        builder.add_preset("hat", 0, 1, vec![ZoneBuilder::instrument(hat)]);
        InstrumentBank::from_parts(builder.build()).expect("valid bank")
    }

    struct Rig {
        bank: InstrumentBank,
        cache: VoiceCache,
        engine: ModulatorEngine,
        config: SynthConfig,
        channel: Channel,
    }

    impl Rig {
        fn new() -> Self {
            let bank = bank();
            let channel = Channel::new(0, false, &bank);
            Self {
                bank,
                cache: VoiceCache::new(),
                engine: ModulatorEngine::new(),
                config: SynthConfig::default(),
                channel,
            }
        }

        fn note_on(&mut self, note: u8, velocity: u8, time: f64) {
            let ctx = ControlContext::new(&self.engine, &self.config, time);
            self.channel
                .note_on(&ctx, &mut self.bank, &mut self.cache, note, velocity);
        }

        fn cc(&mut self, controller: u8, value: u8) {
            let ctx = ControlContext::new(&self.engine, &self.config, 0.0);
            self.channel.controller_change(&ctx, controller, value);
        }
    }

    #[test]
    fn velocity_zero_releases() {
        let mut rig = Rig::new();
        rig.note_on(60, 100, 0.0);
        assert_eq!(rig.channel.voice_count(), 1);
        rig.note_on(60, 0, 0.5);
        assert!(rig.channel.voices()[0].is_in_release());
    }

    #[test]
    fn hold_pedal_defers_release() {
        let mut rig = Rig::new();
        rig.note_on(60, 100, 0.0);
        rig.cc(cc::SUSTAIN_PEDAL, 127);
        let ctx = ControlContext::new(&rig.engine, &rig.config, 0.5);
        rig.channel.note_off(&ctx, 60);
        let voice = &rig.channel.voices()[0];
        assert!(voice.is_sustained() && !voice.is_in_release());

        rig.cc(cc::SUSTAIN_PEDAL, 0);
        assert!(rig.channel.voices()[0].is_in_release());
    }

    #[test]
    fn exclusive_class_chokes_earlier_voice() {
        let mut rig = Rig::new();
        rig.channel.program_change(&rig.bank, 1);
        rig.note_on(42, 100, 0.0);
        rig.note_on(46, 100, 0.1);
        let voices = rig.channel.voices();
        assert_eq!(voices.len(), 2);
        assert!(voices[0].is_in_release());
        assert!(voices[0].release_seconds() < 0.002);
        assert!(!voices[1].is_in_release());
    }

    #[test]
    fn transpose_shifts_key_and_drops_out_of_range() {
        let mut rig = Rig::new();
        rig.channel.custom_mut().transpose_semitones = 12;
        rig.note_on(60, 100, 0.0);
        assert_eq!(rig.channel.voices()[0].midi_note(), 72);
        rig.note_on(120, 100, 0.0);
        assert_eq!(rig.channel.voices().len(), 1);
    }

    #[test]
    fn rpn_sets_pitch_wheel_range_and_tuning() {
        let mut rig = Rig::new();
        rig.cc(cc::RPN_MSB, 0);
        rig.cc(cc::RPN_LSB, 0);
        rig.cc(cc::DATA_ENTRY_MSB, 12);
        assert_eq!(rig.channel.controllers().pitch_wheel_range_semitones(), 12.0);

        rig.cc(cc::RPN_LSB, 2);
        rig.cc(cc::DATA_ENTRY_MSB, 62);
        assert_eq!(rig.channel.custom().tuning_semitones, -2);

        rig.cc(cc::RPN_LSB, 1);
        rig.cc(cc::DATA_ENTRY_MSB, 96);
        assert!((rig.channel.custom().tuning_cents - 50.0).abs() < 1e-4);

        // null RPN turns data entry back into a plain controller
        rig.cc(cc::RPN_MSB, 127);
        rig.cc(cc::RPN_LSB, 127);
        rig.cc(cc::DATA_ENTRY_MSB, 3);
        assert_eq!(rig.channel.controllers().pitch_wheel_range_semitones(), 12.0);
        assert_eq!(rig.channel.controllers().cc(cc::DATA_ENTRY_MSB), 3);
    }

    #[test]
    fn locked_controller_ignores_changes() {
        let mut rig = Rig::new();
        rig.channel.lock_controller(cc::MAIN_VOLUME, true);
        rig.cc(cc::MAIN_VOLUME, 10);
        assert_eq!(rig.channel.controllers().cc(cc::MAIN_VOLUME), 100);
    }

    #[test]
    fn finished_notes_are_reported_once() {
        let mut rig = Rig::new();
        rig.note_on(60, 100, 0.0);
        rig.note_on(60, 90, 0.0);
        rig.note_on(64, 100, 0.0);
        for voice in rig.channel.voices.iter_mut().filter(|v| v.midi_note == 60) {
            voice.finished = true;
        }
        let mut finished = Vec::new();
        rig.channel.remove_finished(|note| finished.push(note));
        assert_eq!(finished, vec![60]);
        assert_eq!(rig.channel.voice_count(), 1);
    }
}
