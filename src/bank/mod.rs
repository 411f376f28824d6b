//! Instrument bank: the SoundFont2 data model and per-note layer resolution.
//!
//! Ownership is flat. The bank owns pools of samples, instruments and
//! presets; zones refer to them by index.

pub mod dump;
pub mod generator;
pub mod instrument;
pub mod modulator;
pub mod parts;
pub mod preset;
pub mod sample;
pub mod zone;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::DRUM_BANK;

use self::dump::{LayerDump, NoteDump};
use self::instrument::Instrument;
use self::modulator::{default_modulators, Modulator};
use self::parts::{BankInfo, BankParts};
use self::preset::{Preset, VoiceLayer};
use self::sample::Sample;
use self::zone::{partition_zones, resolve_zones};

#[derive(Debug, Clone)]
pub struct InstrumentBank {
    info: BankInfo,
    samples: Vec<Sample>,
    instruments: Vec<Instrument>,
    presets: Vec<Preset>,
    default_modulators: Vec<Modulator>,
}

impl InstrumentBank {
    /// Validates and links parsed chunk records.
    ///
    /// Any inconsistency rejects the whole bank.
    pub fn from_parts(parts: BankParts) -> Result<Self> {
        let BankParts {
            info,
            sample_data,
            mut samples,
            instruments,
            instrument_bags,
            instrument_modulators,
            instrument_generators,
            presets,
            preset_bags,
            preset_modulators,
            preset_generators,
        } = parts;

        if samples.pop().is_none() {
            return Err(Error::MalformedBank("sample list lacks its terminator".into()));
        }
        let mut decoded = Vec::with_capacity(samples.len());
        for raw in samples {
            let mut sample = Sample::new(
                raw.name,
                raw.start,
                raw.end,
                raw.loop_start,
                raw.loop_end,
                raw.sample_rate,
                raw.original_pitch,
                raw.pitch_correction,
                raw.link,
                raw.sample_type,
            );
            if !sample.compressed && !sample.is_terminator() && !sample.decode_from(&sample_data) {
                return Err(Error::IndexOutOfRange {
                    kind: "sample data",
                    index: sample.end as usize,
                    len: sample_data.len(),
                });
            }
            decoded.push(sample);
        }

        let instrument_zones = resolve_zones(&instrument_bags, &instrument_generators, &instrument_modulators)?;
        let starts: Vec<usize> = instruments.iter().map(|i| i.bag_index as usize).collect();
        let instrument_list = partition_zones("instrument bag", &starts, &instrument_zones)?
            .into_iter()
            .zip(instruments)
            .map(|(zones, raw)| Instrument::from_zones(raw.name, zones, &decoded))
            .collect::<Result<Vec<_>>>()?;

        let preset_zones = resolve_zones(&preset_bags, &preset_generators, &preset_modulators)?;
        let starts: Vec<usize> = presets.iter().map(|p| p.bag_index as usize).collect();
        let preset_list = partition_zones("preset bag", &starts, &preset_zones)?
            .into_iter()
            .zip(presets)
            .map(|(zones, raw)| {
                Preset::from_zones(raw.name, raw.bank, raw.program, zones, instrument_list.len())
            })
            .collect::<Result<Vec<_>>>()?;

        if preset_list.is_empty() {
            return Err(Error::MalformedBank("bank contains no presets".into()));
        }

        info!(
            bank = %info.name,
            presets = preset_list.len(),
            instruments = instrument_list.len(),
            samples = decoded.len(),
            "instrument bank loaded"
        );

        let mut bank = Self {
            info,
            samples: decoded,
            instruments: instrument_list,
            presets: preset_list,
            default_modulators: default_modulators(),
        };
        bank.prepare_layers();
        Ok(bank)
    }

    pub fn info(&self) -> &BankInfo {
        &self.info
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn preset(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    pub fn default_modulators(&self) -> &[Modulator] {
        &self.default_modulators
    }

    /// Finds the preset for (bank, program), falling back instead of failing.
    ///
    /// Order: exact match; for the drum bank any drum preset; otherwise the
    /// same program in a melodic bank; finally the first preset.
    pub fn preset_index(&self, bank: u16, program: u8) -> usize {
        let program = program as u16;
        let find = |pred: &dyn Fn(&Preset) -> bool| self.presets.iter().position(pred);

        if let Some(i) = find(&|p| p.bank == bank && p.program == program) {
            return i;
        }
        let fallback = if bank == DRUM_BANK {
            find(&|p| p.is_drum())
        } else {
            find(&|p| p.program == program && !p.is_drum())
        };
        match fallback {
            Some(i) => {
                debug!(bank, program, found = %self.presets[i].name, "preset fallback");
                i
            }
            None => {
                debug!(bank, program, "no fallback preset, using the first one");
                0
            }
        }
    }

    /// Layers of `preset` for (note, velocity); empty when nothing matches.
    pub fn samples_and_generators(&mut self, preset: usize, note: u8, velocity: u8) -> Arc<[VoiceLayer]> {
        let Self {
            presets,
            instruments,
            default_modulators,
            ..
        } = self;
        match presets.get_mut(preset) {
            Some(p) => p.samples_and_generators(instruments, default_modulators, note, velocity),
            None => Arc::from(Vec::new()),
        }
    }

    /// Drops every preset's layer table. Later lookups rebuild it.
    pub fn clear_caches(&mut self) {
        for preset in &mut self.presets {
            preset.clear_cache();
        }
    }

    /// Builds every preset's layer table so note-on only looks layers up.
    pub fn prepare_layers(&mut self) {
        let Self {
            presets,
            instruments,
            default_modulators,
            ..
        } = self;
        for preset in presets.iter_mut() {
            preset.prepare(instruments, default_modulators);
        }
        debug!(presets = presets.len(), "preset layers prepared");
    }

    /// Stores PCM decoded out of band. Returns false for an unknown sample.
    pub fn install_sample_pcm(&mut self, index: usize, pcm: Arc<[f32]>) -> bool {
        match self.samples.get_mut(index) {
            Some(sample) => {
                sample.set_pcm(pcm);
                true
            }
            None => false,
        }
    }

    /// Resolved generators and modulators for a note, for debugging.
    pub fn dump_note(&mut self, preset: usize, note: u8, velocity: u8) -> NoteDump {
        let layers = self.samples_and_generators(preset, note, velocity);
        let (name, bank, program) = self
            .presets
            .get(preset)
            .map_or((String::new(), 0, 0), |p| (p.name.clone(), p.bank, p.program));
        NoteDump {
            preset: name,
            bank,
            program,
            note,
            velocity,
            layers: layers
                .iter()
                .map(|layer| LayerDump {
                    sample: self
                        .samples
                        .get(layer.sample)
                        .map_or_else(String::new, |s| s.name.clone()),
                    generators: layer.generators(),
                    modulators: layer.modulators.clone(),
                })
                .collect(),
        }
    }
}

/// Appends the presets of `others` whose (bank, program) is still free.
///
/// Instruments and samples are carried along with re-based indices; the
/// primary bank's info wins.
pub fn merge_banks(primary: InstrumentBank, others: impl IntoIterator<Item = InstrumentBank>) -> InstrumentBank {
    let mut merged = primary;
    for bank in others {
        let sample_offset = merged.samples.len();
        let instrument_offset = merged.instruments.len();
        let mut added = 0usize;

        merged.samples.extend(bank.samples);
        merged.instruments.extend(bank.instruments.into_iter().map(|mut inst| {
            inst.offset_samples(sample_offset);
            inst
        }));
        for mut preset in bank.presets {
            let taken = merged
                .presets
                .iter()
                .any(|p| p.bank == preset.bank && p.program == preset.program);
            if taken {
                continue;
            }
            preset.offset_instruments(instrument_offset);
            merged.presets.push(preset);
            added += 1;
        }
        info!(from = %bank.info.name, added, "merged instrument bank");
    }
    merged.clear_caches();
    merged.prepare_layers();
    merged
}
