//! Chunk-level records handed over by a SoundFont2 reader.
//!
//! These mirror `shdr`, `inst/ibag/imod/igen` and `phdr/pbag/pmod/pgen`
//! one-to-one, terminator records included. [`BankBuilder`] assembles the
//! same records from code, for procedural banks and tests.

use std::sync::Arc;

use super::generator::{Generator, GeneratorType};
use super::modulator::Modulator;
use super::sample::SAMPLE_TYPE_COMPRESSED;

/// `sfSampleType` of an ordinary mono sample.
pub const SAMPLE_TYPE_MONO: u16 = 1;

/// Zero frames written after every sample in the blob.
const SAMPLE_PADDING: usize = 46;

/// One `shdr` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub link: u16,
    pub sample_type: u16,
}

/// One `ibag` / `pbag` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBag {
    pub generator_index: u16,
    pub modulator_index: u16,
}

/// One `igen` / `pgen` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGenerator {
    pub operator: u16,
    pub amount: i16,
}

/// One `imod` / `pmod` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawModulator {
    pub source: u16,
    pub destination: u16,
    pub amount: i16,
    pub amount_source: u16,
    pub transform: u16,
}

/// One `inst` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstrument {
    pub name: String,
    pub bag_index: u16,
}

/// One `phdr` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPreset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub bag_index: u16,
}

/// Bank-level metadata from the INFO list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankInfo {
    pub name: String,
    pub engine: String,
    pub version: (u16, u16),
    pub comment: Option<String>,
}

/// Everything a parsed SF2 file contributes to an [`InstrumentBank`](super::InstrumentBank).
#[derive(Debug, Clone, Default)]
pub struct BankParts {
    pub info: BankInfo,
    /// The `smpl` chunk.
    pub sample_data: Arc<[i16]>,
    pub samples: Vec<RawSample>,
    pub instruments: Vec<RawInstrument>,
    pub instrument_bags: Vec<RawBag>,
    pub instrument_modulators: Vec<RawModulator>,
    pub instrument_generators: Vec<RawGenerator>,
    pub presets: Vec<RawPreset>,
    pub preset_bags: Vec<RawBag>,
    pub preset_modulators: Vec<RawModulator>,
    pub preset_generators: Vec<RawGenerator>,
}

/// A zone under construction.
#[derive(Debug, Clone, Default)]
pub struct ZoneBuilder {
    generators: Vec<Generator>,
    modulators: Vec<Modulator>,
    target: Option<u16>,
    key_range: Option<(u8, u8)>,
    vel_range: Option<(u8, u8)>,
}

impl ZoneBuilder {
    /// A zone without a sample/instrument selector. Only valid as the first zone.
    pub fn global() -> Self {
        Self::default()
    }

    /// An instrument zone playing `sample`.
    pub fn sample(sample: usize) -> Self {
        Self {
            target: Some(sample as u16),
            ..Self::default()
        }
    }

    /// A preset zone layering `instrument`.
    pub fn instrument(instrument: usize) -> Self {
        Self::sample(instrument)
    }

    pub fn key_range(mut self, min: u8, max: u8) -> Self {
        self.key_range = Some((min, max));
        self
    }

    pub fn vel_range(mut self, min: u8, max: u8) -> Self {
        self.vel_range = Some((min, max));
        self
    }

    pub fn generator(mut self, kind: GeneratorType, value: i16) -> Self {
        self.generators.push(Generator::new(kind, value));
        self
    }

    pub fn modulator(mut self, modulator: Modulator) -> Self {
        self.modulators.push(modulator);
        self
    }

    // keyRange first, velRange second, selector last.
    fn emit(&self, selector: GeneratorType, gens: &mut Vec<RawGenerator>, mods: &mut Vec<RawModulator>) {
        let range = |kind: GeneratorType, (lo, hi): (u8, u8)| RawGenerator {
            operator: kind as u16,
            amount: i16::from_le_bytes([lo, hi]),
        };
        if let Some(r) = self.key_range {
            gens.push(range(GeneratorType::KeyRange, r));
        }
        if let Some(r) = self.vel_range {
            gens.push(range(GeneratorType::VelRange, r));
        }
        gens.extend(self.generators.iter().map(|g| RawGenerator {
            operator: g.kind as u16,
            amount: g.value,
        }));
        if let Some(target) = self.target {
            gens.push(RawGenerator {
                operator: selector as u16,
                amount: target as i16,
            });
        }
        mods.extend(self.modulators.iter().map(|m| RawModulator {
            source: m.source.to_raw(),
            destination: m.destination.map_or(u16::MAX, |d| d as u16),
            amount: m.amount.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            amount_source: m.secondary.to_raw(),
            transform: m.transform.to_raw(),
        }));
    }
}

struct PendingHeader {
    name: String,
    bank: u16,
    program: u16,
    zones: Vec<ZoneBuilder>,
}

/// Assembles chunk records (terminators included) from code.
#[derive(Default)]
pub struct BankBuilder {
    info: BankInfo,
    sample_data: Vec<i16>,
    samples: Vec<RawSample>,
    instruments: Vec<PendingHeader>,
    presets: Vec<PendingHeader>,
}

impl BankBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: BankInfo {
                name: name.into(),
                engine: "EMU8000".to_string(),
                version: (2, 4),
                comment: None,
            },
            ..Self::default()
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_sample(
        &mut self,
        name: &str,
        frames: &[i16],
        len: usize,
        sample_rate: u32,
        root_key: u8,
        looped: Option<(usize, usize)>,
        sample_type: u16,
    ) -> usize {
        let start = self.sample_data.len() as u32;
        if frames.is_empty() {
            self.sample_data.resize(self.sample_data.len() + len, 0);
        } else {
            self.sample_data.extend_from_slice(frames);
        }
        let end = start + len as u32;
        self.sample_data
            .resize(self.sample_data.len() + SAMPLE_PADDING, 0);
        let (loop_start, loop_end) = looped.unwrap_or((0, len));
        self.samples.push(RawSample {
            name: name.to_string(),
            start,
            end,
            loop_start: start + loop_start as u32,
            loop_end: start + loop_end as u32,
            sample_rate,
            original_pitch: root_key,
            pitch_correction: 0,
            link: 0,
            sample_type,
        });
        self.samples.len() - 1
    }

    /// Adds a mono sample; floats are quantized to 16 bits like the `smpl` chunk.
    pub fn add_sample(&mut self, name: &str, pcm: &[f32], sample_rate: u32, root_key: u8) -> usize {
        let frames = quantize(pcm);
        self.push_sample(name, &frames, frames.len(), sample_rate, root_key, None, SAMPLE_TYPE_MONO)
    }

    /// Adds a sample with a loop, given relative to the sample's first frame.
    pub fn add_looped_sample(
        &mut self,
        name: &str,
        pcm: &[f32],
        sample_rate: u32,
        root_key: u8,
        loop_start: usize,
        loop_end: usize,
    ) -> usize {
        let frames = quantize(pcm);
        self.push_sample(
            name,
            &frames,
            frames.len(),
            sample_rate,
            root_key,
            Some((loop_start, loop_end)),
            SAMPLE_TYPE_MONO,
        )
    }

    /// Adds a compressed sample of `len` frames whose PCM arrives later as a dump.
    pub fn add_compressed_sample(&mut self, name: &str, len: usize, sample_rate: u32, root_key: u8) -> usize {
        self.push_sample(
            name,
            &[],
            len,
            sample_rate,
            root_key,
            None,
            SAMPLE_TYPE_MONO | SAMPLE_TYPE_COMPRESSED,
        )
    }

    /// Sets the pitch correction (cents) of a previously added sample.
    pub fn pitch_correction(&mut self, sample: usize, cents: i8) -> &mut Self {
        if let Some(s) = self.samples.get_mut(sample) {
            s.pitch_correction = cents;
        }
        self
    }

    pub fn add_instrument(&mut self, name: &str, zones: Vec<ZoneBuilder>) -> usize {
        self.instruments.push(PendingHeader {
            name: name.to_string(),
            bank: 0,
            program: 0,
            zones,
        });
        self.instruments.len() - 1
    }

    pub fn add_preset(&mut self, name: &str, bank: u16, program: u16, zones: Vec<ZoneBuilder>) -> usize {
        self.presets.push(PendingHeader {
            name: name.to_string(),
            bank,
            program,
            zones,
        });
        self.presets.len() - 1
    }

    pub fn build(self) -> BankParts {
        let mut parts = BankParts {
            info: self.info,
            ..BankParts::default()
        };

        let mut samples = self.samples;
        let eos = samples.last().map_or(0, |s| s.end + SAMPLE_PADDING as u32);
        samples.push(RawSample {
            name: "EOS".to_string(),
            start: eos,
            end: eos,
            loop_start: eos,
            loop_end: eos,
            sample_rate: 0,
            original_pitch: 0,
            pitch_correction: 0,
            link: 0,
            sample_type: 0,
        });
        parts.samples = samples;
        parts.sample_data = Arc::from(self.sample_data);

        for header in &self.instruments {
            parts.instruments.push(RawInstrument {
                name: header.name.clone(),
                bag_index: parts.instrument_bags.len() as u16,
            });
            for zone in &header.zones {
                parts.instrument_bags.push(RawBag {
                    generator_index: parts.instrument_generators.len() as u16,
                    modulator_index: parts.instrument_modulators.len() as u16,
                });
                zone.emit(
                    GeneratorType::SampleId,
                    &mut parts.instrument_generators,
                    &mut parts.instrument_modulators,
                );
            }
        }
        parts.instruments.push(RawInstrument {
            name: "EOI".to_string(),
            bag_index: parts.instrument_bags.len() as u16,
        });
        terminate(
            &mut parts.instrument_bags,
            &mut parts.instrument_generators,
            &mut parts.instrument_modulators,
        );

        for header in &self.presets {
            parts.presets.push(RawPreset {
                name: header.name.clone(),
                program: header.program,
                bank: header.bank,
                bag_index: parts.preset_bags.len() as u16,
            });
            for zone in &header.zones {
                parts.preset_bags.push(RawBag {
                    generator_index: parts.preset_generators.len() as u16,
                    modulator_index: parts.preset_modulators.len() as u16,
                });
                zone.emit(
                    GeneratorType::Instrument,
                    &mut parts.preset_generators,
                    &mut parts.preset_modulators,
                );
            }
        }
        parts.presets.push(RawPreset {
            name: "EOP".to_string(),
            program: 0,
            bank: 0,
            bag_index: parts.preset_bags.len() as u16,
        });
        terminate(
            &mut parts.preset_bags,
            &mut parts.preset_generators,
            &mut parts.preset_modulators,
        );

        parts
    }
}

fn terminate(bags: &mut Vec<RawBag>, gens: &mut Vec<RawGenerator>, mods: &mut Vec<RawModulator>) {
    bags.push(RawBag {
        generator_index: gens.len() as u16,
        modulator_index: mods.len() as u16,
    });
    gens.push(RawGenerator {
        operator: 0,
        amount: 0,
    });
    mods.push(RawModulator::default());
}

fn quantize(pcm: &[f32]) -> Vec<i16> {
    pcm.iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect()
}
