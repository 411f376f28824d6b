use tracing::warn;

use super::generator::GeneratorType;
use super::sample::Sample;
use super::zone::Zone;
use crate::error::{Error, Result};

/// A zone bound to one sample.
#[derive(Debug, Clone)]
pub struct InstrumentZone {
    pub zone: Zone,
    pub sample: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Instrument {
    pub name: String,
    /// First-zone defaults, present only when that zone has no sample selector.
    pub global: Option<Zone>,
    pub zones: Vec<InstrumentZone>,
}

impl Instrument {
    /// Binds resolved zones to samples.
    ///
    /// Selector-less zones after the first are skipped, as are zones playing a
    /// terminator sample. A selector past the sample list is malformed.
    pub(crate) fn from_zones(name: String, zones: Vec<Zone>, samples: &[Sample]) -> Result<Self> {
        let mut instrument = Instrument {
            name,
            ..Default::default()
        };
        for (i, zone) in zones.into_iter().enumerate() {
            match zone.generator(GeneratorType::SampleId) {
                Some(raw) => {
                    let sample = raw as u16 as usize;
                    let Some(target) = samples.get(sample) else {
                        return Err(Error::IndexOutOfRange {
                            kind: "sample",
                            index: sample,
                            len: samples.len(),
                        });
                    };
                    if target.is_terminator() {
                        warn!(instrument = %instrument.name, sample, "zone plays a terminator sample, skipped");
                        continue;
                    }
                    instrument.zones.push(InstrumentZone { zone, sample });
                }
                None if i == 0 => instrument.global = Some(zone),
                None => {
                    warn!(instrument = %instrument.name, zone = i, "zone without a sample, skipped");
                }
            }
        }
        Ok(instrument)
    }

    pub fn offset_samples(&mut self, offset: usize) {
        for zone in &mut self.zones {
            zone.sample += offset;
        }
    }
}
