use crate::bank::generator::GeneratorType;
use crate::dsp::lfo::triangle_lfo;
use crate::dsp::mix::{MixParams, RenderOutput, VoiceSends};
use crate::dsp::oscillator::Interpolation;
use crate::dsp::units::{abs_cents_to_hz, timecents_to_seconds, GainTable};
use crate::modulation::controllers::{ChannelVibrato, CustomControllers};
use crate::MAX_BLOCK_SIZE;

use super::voice::Voice;

/// Per-block control values derived from LFOs and the mod envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BlockModulation {
    /// Total pitch offset in cents, before truncation.
    cents: f32,
    /// Extra attenuation from the mod LFO.
    tremolo_cb: f32,
    /// Cutoff offset in cents.
    filter_excursion: f32,
}

/// Renders voices block by block: oscillator → filter → volume envelope →
/// pan and sends.
pub struct VoiceSynthesizer {
    gains: GainTable,
    buffer: Vec<f32>,
    pub interpolation: Interpolation,
    pub mix: MixParams,
    /// Cents added to every voice.
    pub master_tuning: f32,
}

impl VoiceSynthesizer {
    pub fn new(interpolation: Interpolation, mix: MixParams) -> Self {
        Self {
            gains: GainTable::new(),
            buffer: vec![0.0; MAX_BLOCK_SIZE],
            interpolation,
            mix,
            master_tuning: 0.0,
        }
    }

    /// Adds one voice to `out` and advances it by `out.len()` frames.
    ///
    /// A voice whose PCM has not arrived yet is skipped; it stays in place
    /// until the sample dump resumes it.
    pub fn render_voice(
        &mut self,
        voice: &mut Voice,
        pcm: Option<&[f32]>,
        custom: &CustomControllers,
        vibrato: &ChannelVibrato,
        time: f64,
        out: &mut RenderOutput<'_>,
    ) {
        let Some(pcm) = pcm else {
            return;
        };
        if voice.finished {
            return;
        }
        let len = out.len().min(MAX_BLOCK_SIZE);
        let buffer = &mut self.buffer[..len];

        let modulation = block_modulation(voice, custom, vibrato, self.master_tuning, time);
        let total_cents = modulation.cents.trunc() as i32;
        if total_cents != voice.current_tuning_cents {
            voice.current_tuning_cents = total_cents;
            voice.current_tuning_ratio = (total_cents as f64 / 1200.0).exp2();
        }

        if voice
            .oscillator
            .render(pcm, voice.current_tuning_ratio, buffer, self.interpolation)
        {
            voice.finished = true;
        }

        let g = &voice.modulated;
        voice.filter.process(
            buffer,
            g[GeneratorType::InitialFilterFc.index()],
            g[GeneratorType::InitialFilterQ.index()],
            modulation.filter_excursion,
        );

        voice
            .volume_envelope
            .apply(buffer, modulation.tremolo_cb, &self.gains);
        if voice.volume_envelope.is_finished() {
            voice.finished = true;
        }

        let sends = VoiceSends {
            pan: g[GeneratorType::Pan.index()],
            reverb: g[GeneratorType::ReverbEffectsSend.index()],
            chorus: g[GeneratorType::ChorusEffectsSend.index()],
        };
        voice.panner.mix(buffer, sends, &self.mix, out);
    }
}

fn block_modulation(
    voice: &Voice,
    custom: &CustomControllers,
    vibrato: &ChannelVibrato,
    master_tuning: f32,
    time: f64,
) -> BlockModulation {
    let g = |kind: GeneratorType| voice.modulated[kind.index()];
    let lfo_start = |delay: GeneratorType| voice.start_time() + timecents_to_seconds(g(delay) as f32) as f64;

    let mut cents = g(GeneratorType::FineTune) as f32
        + custom.tuning_cents
        + custom.transpose_fine
        + master_tuning
        + (voice.target_key as i32 - voice.root_key as i32) as f32 * g(GeneratorType::ScaleTuning) as f32;
    let semitones = g(GeneratorType::CoarseTune) + custom.tuning_semitones;
    let mut tremolo_cb = 0.0;
    let mut filter_excursion = 0.0;

    let vibrato_depth = g(GeneratorType::VibLfoToPitch);
    if vibrato_depth != 0 {
        let lfo = triangle_lfo(
            lfo_start(GeneratorType::DelayVibLfo),
            abs_cents_to_hz(g(GeneratorType::FreqVibLfo) as f32),
            time,
        );
        cents += lfo * vibrato_depth as f32 * custom.modulation_multiplier;
    }

    let mod_pitch = g(GeneratorType::ModLfoToPitch);
    let mod_volume = g(GeneratorType::ModLfoToVolume);
    let mod_filter = g(GeneratorType::ModLfoToFilterFc);
    if mod_pitch != 0 || mod_volume != 0 || mod_filter != 0 {
        let lfo = triangle_lfo(
            lfo_start(GeneratorType::DelayModLfo),
            abs_cents_to_hz(g(GeneratorType::FreqModLfo) as f32),
            time,
        );
        cents += lfo * mod_pitch as f32 * custom.modulation_multiplier;
        tremolo_cb = -lfo * mod_volume as f32;
        filter_excursion += lfo * mod_filter as f32;
    }

    if vibrato.depth > 0.0 {
        let lfo = triangle_lfo(voice.start_time() + vibrato.delay as f64, vibrato.rate, time);
        cents += lfo * vibrato.depth;
    }

    let env_pitch = g(GeneratorType::ModEnvToPitch);
    let env_filter = g(GeneratorType::ModEnvToFilterFc);
    if env_pitch != 0 || env_filter != 0 {
        let env = voice.mod_envelope.value(time);
        cents += env * env_pitch as f32;
        filter_excursion += env * env_filter as f32;
    }

    BlockModulation {
        cents: cents + semitones as f32 * 100.0,
        tremolo_cb,
        filter_excursion,
    }
}
