//! Zones and the bag-index resolution shared by instruments and presets.

/*
Bag Resolution
==============

SF2 stores zones as "bags": each bag records where its generator list and
modulator list START in the flat pools. A bag's lists end where the next bag
begins, so every chunk carries one extra terminator bag at the end:

    bags   [ g:0 m:0 ][ g:3 m:0 ][ g:5 m:1 ][ g:9 m:1 ]   <- terminator
    zone      0..3       3..5       5..9
              0..0       0..1       1..1

The last bag never becomes a zone. A chunk with a single bag therefore has
no playable content.

Global Zones
------------

The first zone of an instrument (or preset) is global when it does not end
in a sample (or instrument) selector. Its generators and modulators act as
defaults for every other zone of the same parent; a local value for the same
generator type always wins.
*/

use std::ops::{Range, RangeInclusive};

use super::generator::{find_generator, Generator, GeneratorType};
use super::modulator::Modulator;
use super::parts::{RawBag, RawGenerator, RawModulator};
use crate::error::{Error, Result};

/// Inclusive key or velocity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRange {
    pub min: u8,
    pub max: u8,
}

impl ZoneRange {
    pub const FULL: ZoneRange = ZoneRange { min: 0, max: 127 };

    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn as_range(&self) -> RangeInclusive<u8> {
        self.min..=self.max
    }
}

impl Default for ZoneRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// A zone's generator and modulator lists as copied from its chunk.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    /// Slice of the generator pool this zone was built from.
    pub generator_span: Range<usize>,
    /// Slice of the modulator pool this zone was built from.
    pub modulator_span: Range<usize>,
    pub generators: Vec<Generator>,
    pub modulators: Vec<Modulator>,
    /// `None` when the zone has no keyRange generator.
    pub key_range: Option<ZoneRange>,
    /// `None` when the zone has no velRange generator.
    pub vel_range: Option<ZoneRange>,
}

impl Zone {
    pub fn generator(&self, kind: GeneratorType) -> Option<i16> {
        find_generator(&self.generators, kind)
    }

    /// The key range, falling back to the parent's global range.
    pub fn effective_key_range(&self, global: Option<&Zone>) -> ZoneRange {
        self.key_range
            .or_else(|| global.and_then(|g| g.key_range))
            .unwrap_or_default()
    }

    /// The velocity range, falling back to the parent's global range.
    pub fn effective_vel_range(&self, global: Option<&Zone>) -> ZoneRange {
        self.vel_range
            .or_else(|| global.and_then(|g| g.vel_range))
            .unwrap_or_default()
    }

    pub fn matches(&self, global: Option<&Zone>, key: u8, velocity: u8) -> bool {
        self.effective_key_range(global).contains(key)
            && self.effective_vel_range(global).contains(velocity)
    }

    /// This zone's generators followed by every global generator whose type it lacks.
    pub fn generators_with_global(&self, global: Option<&Zone>) -> Vec<Generator> {
        let mut merged = self.generators.clone();
        if let Some(global) = global {
            for g in &global.generators {
                if !merged.iter().any(|m| m.kind == g.kind) {
                    merged.push(*g);
                }
            }
        }
        merged
    }
}

fn check_span(kind: &'static str, span: &Range<usize>, len: usize) -> Result<()> {
    if span.start > span.end {
        return Err(Error::MalformedBank(format!(
            "{kind} indices decrease ({} > {})",
            span.start, span.end
        )));
    }
    if span.end > len {
        return Err(Error::IndexOutOfRange {
            kind,
            index: span.end,
            len,
        });
    }
    Ok(())
}

/// Builds zones from a bag chunk, dropping the terminator bag.
///
/// Generator records with unknown operators are skipped.
pub fn resolve_zones(
    bags: &[RawBag],
    generators: &[RawGenerator],
    modulators: &[RawModulator],
) -> Result<Vec<Zone>> {
    let mut zones = Vec::with_capacity(bags.len().saturating_sub(1));
    for pair in bags.windows(2) {
        let (bag, next) = (pair[0], pair[1]);
        let generator_span = bag.generator_index as usize..next.generator_index as usize;
        let modulator_span = bag.modulator_index as usize..next.modulator_index as usize;
        check_span("generator", &generator_span, generators.len())?;
        check_span("modulator", &modulator_span, modulators.len())?;

        let zone_generators: Vec<Generator> = generators[generator_span.clone()]
            .iter()
            .filter_map(|raw| {
                GeneratorType::from_index(raw.operator).map(|kind| Generator::new(kind, raw.amount))
            })
            .collect();
        let zone_modulators = modulators[modulator_span.clone()]
            .iter()
            .map(|raw| {
                Modulator::from_raw(
                    raw.source,
                    raw.destination,
                    raw.amount,
                    raw.amount_source,
                    raw.transform,
                )
            })
            .collect();

        let range_of = |kind| {
            zone_generators
                .iter()
                .find(|g: &&Generator| g.kind == kind)
                .map(|g| ZoneRange::new(g.range_low(), g.range_high()))
        };
        let key_range = range_of(GeneratorType::KeyRange);
        let vel_range = range_of(GeneratorType::VelRange);

        zones.push(Zone {
            generator_span,
            modulator_span,
            generators: zone_generators,
            modulators: zone_modulators,
            key_range,
            vel_range,
        });
    }
    Ok(zones)
}

/// Splits `zones` into per-parent lists using each header's first bag index.
///
/// `starts` includes the terminator header, so the last header owns nothing.
pub(crate) fn partition_zones(
    kind: &'static str,
    starts: &[usize],
    zones: &[Zone],
) -> Result<Vec<Vec<Zone>>> {
    starts
        .windows(2)
        .map(|pair| {
            let span = pair[0]..pair[1];
            check_span(kind, &span, zones.len())?;
            Ok(zones[span].to_vec())
        })
        .collect()
}
