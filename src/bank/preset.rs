use std::sync::Arc;

use tracing::warn;

use super::generator::{resolve_generators, Generator, GeneratorSet, GeneratorType};
use super::instrument::Instrument;
use super::modulator::{add_unique_modulators, layer_modulators, Modulator};
use super::zone::{Zone, ZoneRange};
use crate::error::{Error, Result};

/// A zone bound to one instrument.
#[derive(Debug, Clone)]
pub struct PresetZone {
    pub zone: Zone,
    pub instrument: usize,
}

/// One playable layer for a (note, velocity): a sample and the generator
/// and modulator lists that shape it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceLayer {
    /// Instrument zone generators, global ones merged in.
    pub instrument_generators: Vec<Generator>,
    /// Preset zone generators, global ones merged in.
    pub preset_generators: Vec<Generator>,
    /// Instrument, default and preset modulators, layered.
    pub modulators: Vec<Modulator>,
    pub sample: usize,
}

impl VoiceLayer {
    /// The clamped sum of both generator levels.
    pub fn generators(&self) -> GeneratorSet {
        resolve_generators(&self.instrument_generators, &self.preset_generators)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub global: Option<Zone>,
    pub zones: Vec<PresetZone>,
    layers: Option<LayerTable>,
}

/// Layer lists for every (note, velocity).
///
/// Keys and velocities are split into cells at every zone range edge; all
/// pairs inside one cell hit the same zones and share one list.
#[derive(Debug, Clone)]
struct LayerTable {
    key_cell: [u8; 128],
    vel_cell: [u8; 128],
    vel_cells: usize,
    cells: Vec<Arc<[VoiceLayer]>>,
}

impl LayerTable {
    fn get(&self, note: u8, velocity: u8) -> Option<&Arc<[VoiceLayer]>> {
        let key = *self.key_cell.get(note as usize)? as usize;
        let vel = *self.vel_cell.get(velocity as usize)? as usize;
        self.cells.get(key * self.vel_cells + vel)
    }
}

/// Cell index per value, a new cell starting at each range's first value and
/// right after its last.
fn cell_map(ranges: &[ZoneRange]) -> ([u8; 128], Vec<u8>) {
    let mut starts = [false; 128];
    starts[0] = true;
    for range in ranges {
        if let Some(s) = starts.get_mut(range.min as usize) {
            *s = true;
        }
        if let Some(s) = starts.get_mut(range.max as usize + 1) {
            *s = true;
        }
    }
    let mut map = [0u8; 128];
    let mut firsts = Vec::new();
    for (value, start) in starts.iter().enumerate() {
        if *start {
            firsts.push(value as u8);
        }
        map[value] = (firsts.len() - 1) as u8;
    }
    (map, firsts)
}

impl Preset {
    pub(crate) fn from_zones(
        name: String,
        bank: u16,
        program: u16,
        zones: Vec<Zone>,
        instrument_count: usize,
    ) -> Result<Self> {
        let mut preset = Preset {
            name,
            bank,
            program,
            ..Default::default()
        };
        for (i, zone) in zones.into_iter().enumerate() {
            match zone.generator(GeneratorType::Instrument) {
                Some(raw) => {
                    let instrument = raw as u16 as usize;
                    if instrument >= instrument_count {
                        return Err(Error::IndexOutOfRange {
                            kind: "instrument",
                            index: instrument,
                            len: instrument_count,
                        });
                    }
                    preset.zones.push(PresetZone { zone, instrument });
                }
                None if i == 0 => preset.global = Some(zone),
                None => {
                    warn!(preset = %preset.name, zone = i, "zone without an instrument, skipped");
                }
            }
        }
        Ok(preset)
    }

    /// Every layer that sounds for `note` at `velocity`.
    ///
    /// Served from the prepared table; the table is built on first use when
    /// [`Preset::prepare`] has not run.
    pub fn samples_and_generators(
        &mut self,
        instruments: &[Instrument],
        default_modulators: &[Modulator],
        note: u8,
        velocity: u8,
    ) -> Arc<[VoiceLayer]> {
        self.prepare(instruments, default_modulators);
        match self.layers.as_ref().and_then(|table| table.get(note, velocity)) {
            Some(layers) => Arc::clone(layers),
            None => Arc::from(Vec::new()),
        }
    }

    /// Resolves the layers of every (note, velocity) up front. A no-op once built.
    pub fn prepare(&mut self, instruments: &[Instrument], default_modulators: &[Modulator]) {
        if self.layers.is_some() {
            return;
        }
        let mut key_ranges = Vec::new();
        let mut vel_ranges = Vec::new();
        let preset_global = self.global.as_ref();
        for preset_zone in &self.zones {
            key_ranges.push(preset_zone.zone.effective_key_range(preset_global));
            vel_ranges.push(preset_zone.zone.effective_vel_range(preset_global));
            let Some(instrument) = instruments.get(preset_zone.instrument) else {
                continue;
            };
            let instrument_global = instrument.global.as_ref();
            for instrument_zone in &instrument.zones {
                key_ranges.push(instrument_zone.zone.effective_key_range(instrument_global));
                vel_ranges.push(instrument_zone.zone.effective_vel_range(instrument_global));
            }
        }

        let (key_cell, first_keys) = cell_map(&key_ranges);
        let (vel_cell, first_vels) = cell_map(&vel_ranges);
        let mut cells: Vec<Arc<[VoiceLayer]>> = Vec::with_capacity(first_keys.len() * first_vels.len());
        for &note in &first_keys {
            for &velocity in &first_vels {
                cells.push(Arc::from(self.resolve_layers(instruments, default_modulators, note, velocity)));
            }
        }
        self.layers = Some(LayerTable {
            key_cell,
            vel_cell,
            vel_cells: first_vels.len(),
            cells,
        });
    }

    fn resolve_layers(
        &self,
        instruments: &[Instrument],
        default_modulators: &[Modulator],
        note: u8,
        velocity: u8,
    ) -> Vec<VoiceLayer> {
        let mut layers = Vec::new();
        let preset_global = self.global.as_ref();

        for preset_zone in &self.zones {
            if !preset_zone.zone.matches(preset_global, note, velocity) {
                continue;
            }
            let Some(instrument) = instruments.get(preset_zone.instrument) else {
                continue;
            };
            let preset_generators = preset_zone.zone.generators_with_global(preset_global);
            let mut preset_modulators = preset_zone.zone.modulators.clone();
            if let Some(global) = preset_global {
                add_unique_modulators(&mut preset_modulators, &global.modulators);
            }

            let instrument_global = instrument.global.as_ref();
            for instrument_zone in &instrument.zones {
                if !instrument_zone.zone.matches(instrument_global, note, velocity) {
                    continue;
                }
                let instrument_generators =
                    instrument_zone.zone.generators_with_global(instrument_global);
                let mut instrument_modulators = instrument_zone.zone.modulators.clone();
                if let Some(global) = instrument_global {
                    add_unique_modulators(&mut instrument_modulators, &global.modulators);
                }
                add_unique_modulators(&mut instrument_modulators, default_modulators);

                layers.push(VoiceLayer {
                    instrument_generators,
                    preset_generators: preset_generators.clone(),
                    modulators: layer_modulators(&instrument_modulators, &preset_modulators),
                    sample: instrument_zone.sample,
                });
            }
        }
        layers
    }

    /// Drops the prepared layer table.
    pub fn clear_cache(&mut self) {
        self.layers = None;
    }

    pub fn offset_instruments(&mut self, offset: usize) {
        for zone in &mut self.zones {
            zone.instrument += offset;
        }
        self.clear_cache();
    }

    pub fn is_drum(&self) -> bool {
        self.bank == crate::DRUM_BANK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::instrument::InstrumentZone;
    use crate::bank::zone::ZoneRange;

    fn instrument() -> Instrument {
        Instrument {
            name: "inst".into(),
            global: Some(Zone {
                generators: vec![
                    Generator::new(GeneratorType::Pan, -100),
                    Generator::new(GeneratorType::CoarseTune, 2),
                ],
                ..Default::default()
            }),
            zones: vec![
                InstrumentZone {
                    zone: Zone {
                        key_range: Some(ZoneRange::new(0, 59)),
                        generators: vec![Generator::new(GeneratorType::Pan, 250)],
                        ..Default::default()
                    },
                    sample: 0,
                },
                InstrumentZone {
                    zone: Zone {
                        key_range: Some(ZoneRange::new(60, 127)),
                        ..Default::default()
                    },
                    sample: 1,
                },
            ],
        }
    }

    fn preset() -> Preset {
        Preset {
            name: "preset".into(),
            zones: vec![PresetZone {
                zone: Zone {
                    vel_range: Some(ZoneRange::new(1, 100)),
                    generators: vec![Generator::new(GeneratorType::CoarseTune, 1)],
                    ..Default::default()
                },
                instrument: 0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn layers_follow_key_and_velocity_ranges() {
        let instruments = vec![instrument()];
        let mut p = preset();

        let low = p.samples_and_generators(&instruments, &[], 40, 64);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sample, 0);

        let high = p.samples_and_generators(&instruments, &[], 80, 64);
        assert_eq!(high[0].sample, 1);

        let loud = p.samples_and_generators(&instruments, &[], 80, 120);
        assert!(loud.is_empty(), "velocity outside the preset zone yields no layers");
    }

    #[test]
    fn global_generators_fill_only_missing_types() {
        let instruments = vec![instrument()];
        let mut p = preset();

        let low = p.samples_and_generators(&instruments, &[], 40, 64);
        let set = low[0].generators();
        assert_eq!(set[GeneratorType::Pan.index()], 250, "local pan wins");
        assert_eq!(set[GeneratorType::CoarseTune.index()], 3, "global 2 + preset 1");

        let high = p.samples_and_generators(&instruments, &[], 80, 64);
        assert_eq!(high[0].generators()[GeneratorType::Pan.index()], -100);
    }

    #[test]
    fn memo_returns_the_same_layers_until_cleared() {
        let instruments = vec![instrument()];
        let mut p = preset();
        let first = p.samples_and_generators(&instruments, &[], 40, 64);
        let second = p.samples_and_generators(&instruments, &[], 40, 64);
        assert!(Arc::ptr_eq(&first, &second));

        p.clear_cache();
        let third = p.samples_and_generators(&instruments, &[], 40, 64);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn prepared_table_shares_one_list_per_zone_cell() {
        let instruments = vec![instrument()];
        let mut p = preset();
        p.prepare(&instruments, &[]);

        // keys 0..=59 and velocities 1..=100 hit the same zones
        let a = p.samples_and_generators(&instruments, &[], 10, 5);
        let b = p.samples_and_generators(&instruments, &[], 59, 100);
        assert!(Arc::ptr_eq(&a, &b));

        let other_key = p.samples_and_generators(&instruments, &[], 60, 100);
        assert!(!Arc::ptr_eq(&a, &other_key));
        assert_eq!(other_key[0].sample, 1);

        assert!(p.samples_and_generators(&instruments, &[], 10, 0).is_empty());
        assert!(p.samples_and_generators(&instruments, &[], 10, 101).is_empty());
    }

    #[test]
    fn every_note_and_velocity_resolves_like_a_direct_walk() {
        let instruments = vec![instrument()];
        let mut p = preset();
        for note in 0..128u8 {
            for velocity in (0..128u8).step_by(7) {
                let direct = p.resolve_layers(&instruments, &[], note, velocity);
                let prepared = p.samples_and_generators(&instruments, &[], note, velocity);
                assert_eq!(&direct[..], &prepared[..], "note {note} velocity {velocity}");
            }
        }
    }

    #[test]
    fn cell_map_splits_at_range_edges() {
        let (map, firsts) = cell_map(&[ZoneRange::new(10, 20), ZoneRange::new(15, 127)]);
        assert_eq!(firsts, vec![0, 10, 15, 21]);
        assert_eq!(map[9], 0);
        assert_eq!(map[10], 1);
        assert_eq!(map[14], 1);
        assert_eq!(map[20], 2);
        assert_eq!(map[21], 3);
        assert_eq!(map[127], 3);
    }
}
