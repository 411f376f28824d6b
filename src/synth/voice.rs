use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::bank::generator::{GeneratorSet, GeneratorType};
use crate::bank::modulator::{Modulator, SourceKind};
use crate::bank::preset::VoiceLayer;
use crate::bank::sample::Sample;
use crate::bank::InstrumentBank;
use crate::dsp::envelope::{EnvelopeState, VolumeEnvelope, VolumeEnvelopeParams};
use crate::dsp::filter::LowpassFilter;
use crate::dsp::mix::StereoPanner;
use crate::dsp::mod_envelope::{ModEnvelopeParams, ModulationEnvelope};
use crate::dsp::oscillator::WavetableOscillator;
use crate::dsp::units::timecents_to_seconds;
use crate::modulation::controllers::ControllerTable;
use crate::modulation::{touches_volume_envelope, ModulatorEngine, VoiceSourceContext};

// SF2 banks are authored against EMU hardware, which applies 0.4 of the
// attenuation generator.
const EMU_ATTENUATION_FACTOR: f32 = 0.4;

/// Release used when a voice is cut short (kill, exclusive class).
const INSTANT_RELEASE_TIMECENTS: i32 = -12000;
const EXCLUSIVE_MOD_RELEASE_TIMECENTS: i32 = -1130;

/// One sounding sample layer of a note.
///
/// A voice is plain data: the cache keeps built voices as templates and
/// every note-on clones them.
#[derive(Debug, Clone)]
pub struct Voice {
    pub(crate) channel: u8,
    pub(crate) midi_note: u8,
    pub(crate) target_key: u8,
    pub(crate) velocity: u8,
    pub(crate) poly_pressure: u8,
    pub(crate) root_key: u8,
    pub(crate) sample: usize,
    pub(crate) exclusive_class: i32,

    pub(crate) generators: GeneratorSet,
    pub(crate) modulated: GeneratorSet,
    pub(crate) modulators: Arc<[Modulator]>,

    pub(crate) oscillator: WavetableOscillator,
    pub(crate) volume_envelope: VolumeEnvelope,
    pub(crate) mod_envelope: ModulationEnvelope,
    pub(crate) filter: LowpassFilter,
    pub(crate) panner: StereoPanner,

    pub(crate) current_tuning_cents: i32,
    pub(crate) current_tuning_ratio: f64,

    start_time: f64,
    release_start_time: f64,
    is_in_release: bool,
    release_started: bool,
    sustained: bool,
    pub(crate) finished: bool,
}

impl Voice {
    /// Builds a voice template for one layer. Key and velocity may be
    /// replaced by the keyNum and velocity generators.
    pub fn from_layer(layer: &VoiceLayer, sample: &Sample, key: u8, velocity: u8, sample_rate: f32) -> Self {
        let mut generators = layer.generators();
        let attenuation = &mut generators[GeneratorType::InitialAttenuation.index()];
        *attenuation = (*attenuation as f32 * EMU_ATTENUATION_FACTOR).floor() as i32;

        let g = |kind: GeneratorType| generators[kind.index()];
        let override_or = |kind: GeneratorType, fallback: u8| match g(kind) {
            value @ 0..=127 => value as u8,
            _ => fallback,
        };
        let root_key = override_or(GeneratorType::OverridingRootKey, sample.root_key);
        let target_key = override_or(GeneratorType::KeyNum, key);
        let velocity = override_or(GeneratorType::Velocity, velocity);

        Self {
            channel: 0,
            midi_note: key,
            target_key,
            velocity,
            poly_pressure: 0,
            root_key,
            sample: layer.sample,
            exclusive_class: g(GeneratorType::ExclusiveClass),
            generators,
            modulated: generators,
            modulators: Arc::from(layer.modulators.as_slice()),
            oscillator: WavetableOscillator::new(sample, sample_rate, &generators),
            volume_envelope: VolumeEnvelope::new(sample_rate, g(GeneratorType::SustainVolEnv)),
            mod_envelope: ModulationEnvelope::new(),
            filter: LowpassFilter::new(sample_rate),
            panner: StereoPanner::new(),
            current_tuning_cents: 0,
            current_tuning_ratio: 1.0,
            start_time: 0.0,
            release_start_time: f64::INFINITY,
            is_in_release: false,
            release_started: false,
            sustained: false,
            finished: false,
        }
    }

    /// Turns a cloned template into a playing voice.
    ///
    /// Modulators are evaluated against the channel first so that sample
    /// offsets and envelopes see modulated values.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start(
        &mut self,
        channel: u8,
        midi_note: u8,
        time: f64,
        sample: &Sample,
        sample_rate: f32,
        engine: &ModulatorEngine,
        controllers: &ControllerTable,
    ) {
        self.channel = channel;
        self.midi_note = midi_note;
        self.start_time = time;
        self.release_start_time = f64::INFINITY;

        let ctx = self.source_context();
        engine.compute_modulators(&self.modulators, &self.generators, &mut self.modulated, controllers, &ctx);
        self.oscillator = WavetableOscillator::new(sample, sample_rate, &self.modulated);
        self.volume_envelope.recalculate(&self.volume_params());
        self.mod_envelope.recalculate(&self.mod_params(), time);
    }

    pub(crate) fn source_context(&self) -> VoiceSourceContext {
        VoiceSourceContext {
            key: self.midi_note,
            velocity: self.velocity,
            poly_pressure: self.poly_pressure,
        }
    }

    fn volume_params(&self) -> VolumeEnvelopeParams {
        VolumeEnvelopeParams::from_generators(&self.modulated, self.target_key)
    }

    fn mod_params(&self) -> ModEnvelopeParams {
        ModEnvelopeParams::from_generators(&self.modulated, self.midi_note)
    }

    /// Re-evaluates the modulators reading `source` after it changed.
    pub(crate) fn update_source(&mut self, engine: &ModulatorEngine, controllers: &ControllerTable, source: SourceKind) {
        let ctx = self.source_context();
        let touched = engine.compute_modulators_for_source(
            &self.modulators,
            &self.generators,
            &mut self.modulated,
            controllers,
            &ctx,
            source,
        );
        if touches_volume_envelope(touched) {
            self.volume_envelope.recalculate(&self.volume_params());
        }
    }

    /// Full modulator re-evaluation, used after a controller reset.
    pub(crate) fn update_all_sources(&mut self, engine: &ModulatorEngine, controllers: &ControllerTable) {
        let ctx = self.source_context();
        engine.compute_modulators(&self.modulators, &self.generators, &mut self.modulated, controllers, &ctx);
        self.volume_envelope.recalculate(&self.volume_params());
    }

    /// Schedules the release no earlier than `min_note_length` after note-on.
    pub(crate) fn release(&mut self, time: f64, min_note_length: f64) {
        self.is_in_release = true;
        self.sustained = false;
        self.release_start_time = time.max(self.start_time + min_note_length);
    }

    /// Enters the envelope release once its scheduled time has come.
    pub(crate) fn begin_release_if_due(&mut self, time: f64) {
        if self.is_in_release && !self.release_started && time >= self.release_start_time {
            self.release_started = true;
            self.volume_envelope.start_release(&self.volume_params());
            self.mod_envelope
                .start_release(&self.mod_params(), self.start_time, self.release_start_time);
            self.oscillator.stop_looping();
        }
    }

    /// Near-instant release for a killed note.
    pub(crate) fn kill(&mut self, time: f64) {
        self.cut(time, None);
    }

    /// Choke by another note of the same exclusive class.
    pub(crate) fn exclusive_release(&mut self, time: f64) {
        self.cut(time, Some(EXCLUSIVE_MOD_RELEASE_TIMECENTS));
    }

    fn cut(&mut self, time: f64, mod_release: Option<i32>) {
        let vol = GeneratorType::ReleaseVolEnv.index();
        self.generators[vol] = INSTANT_RELEASE_TIMECENTS;
        self.modulated[vol] = INSTANT_RELEASE_TIMECENTS;
        if let Some(release) = mod_release {
            let m = GeneratorType::ReleaseModEnv.index();
            self.generators[m] = release;
            self.modulated[m] = release;
        }

        if self.release_started {
            self.volume_envelope.recalculate(&self.volume_params());
            self.mod_envelope.recalculate(&self.mod_params(), self.start_time);
        } else {
            self.release(time, 0.0);
        }
    }

    pub(crate) fn set_sustained(&mut self) {
        self.sustained = true;
    }

    /// Rebuilds the oscillator over the PCM that arrived late and moves it to
    /// where playback would be by now.
    pub(crate) fn resume_at(&mut self, sample: &Sample, time: f64, sample_rate: f32) {
        self.oscillator = WavetableOscillator::new(sample, sample_rate, &self.modulated);
        if self.release_started {
            self.oscillator.stop_looping();
        }
        let frames = (time - self.start_time).max(0.0) * sample_rate as f64;
        if self.oscillator.seek(frames, self.current_tuning_ratio) {
            self.finished = true;
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn midi_note(&self) -> u8 {
        self.midi_note
    }

    pub fn target_key(&self) -> u8 {
        self.target_key
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn exclusive_class(&self) -> i32 {
        self.exclusive_class
    }

    pub fn generators(&self) -> &GeneratorSet {
        &self.generators
    }

    pub fn modulated_generators(&self) -> &GeneratorSet {
        &self.modulated
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn release_start_time(&self) -> f64 {
        self.release_start_time
    }

    /// Release length in seconds at full level.
    pub fn release_seconds(&self) -> f32 {
        timecents_to_seconds(self.modulated[GeneratorType::ReleaseVolEnv.index()] as f32)
    }

    pub fn is_in_release(&self) -> bool {
        self.is_in_release
    }

    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pitch offset of the last rendered block, in cents.
    pub fn tuning_cents(&self) -> i32 {
        self.current_tuning_cents
    }

    /// Fractional sample frame the oscillator reads next.
    pub fn playback_position(&self) -> f64 {
        self.oscillator.cursor()
    }

    /// End of the playable sample region, in frames.
    pub fn playback_region_end(&self) -> usize {
        self.oscillator.region().end
    }

    pub fn envelope_state(&self) -> EnvelopeState {
        self.volume_envelope.state()
    }

    pub fn current_attenuation_db(&self) -> f32 {
        self.volume_envelope.current_attenuation_db()
    }
}

/// Built voice templates keyed by (preset index, key, velocity).
///
/// Shared by every channel playing the same preset. A hit clones the
/// templates instead of resolving zones and generators again.
#[derive(Debug, Default)]
pub struct VoiceCache {
    templates: HashMap<(usize, u8, u8), Vec<Voice>>,
}

impl VoiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that holds `notes` entries before its table grows.
    pub fn with_capacity(notes: usize) -> Self {
        Self {
            templates: HashMap::with_capacity(notes),
        }
    }

    pub fn capacity(&self) -> usize {
        self.templates.capacity()
    }

    /// Templates for a note, built on first use.
    pub fn voices(
        &mut self,
        bank: &mut InstrumentBank,
        preset: usize,
        key: u8,
        velocity: u8,
        sample_rate: f32,
    ) -> &[Voice] {
        self.templates.entry((preset, key, velocity)).or_insert_with(|| {
            let layers = bank.samples_and_generators(preset, key, velocity);
            layers
                .iter()
                .filter_map(|layer| match bank.sample(layer.sample) {
                    Some(sample) => Some(Voice::from_layer(layer, sample, key, velocity, sample_rate)),
                    None => {
                        debug!(sample = layer.sample, "layer references a missing sample");
                        None
                    }
                })
                .collect()
        })
        .as_slice()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }
}
