use std::fmt;

use super::generator::{GeneratorSet, GeneratorType};
use super::modulator::Modulator;

/// Resolved parameters of one layer, for debugging.
#[derive(Debug, Clone)]
pub struct LayerDump {
    pub sample: String,
    pub generators: GeneratorSet,
    pub modulators: Vec<Modulator>,
}

/// Everything a note would play, as resolved from its preset.
#[derive(Debug, Clone)]
pub struct NoteDump {
    pub preset: String,
    pub bank: u16,
    pub program: u16,
    pub note: u8,
    pub velocity: u8,
    pub layers: Vec<LayerDump>,
}

impl fmt::Display for NoteDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}:{}) note {} velocity {}: {} layer(s)",
            self.preset,
            self.bank,
            self.program,
            self.note,
            self.velocity,
            self.layers.len()
        )?;
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  layer {} sample \"{}\"", i, layer.sample)?;
            for kind in GeneratorType::ALL {
                let value = layer.generators[kind.index()];
                if value != kind.limits().default {
                    writeln!(f, "    {:<28} {}", kind.name(), value)?;
                }
            }
            for modulator in &layer.modulators {
                writeln!(f, "    mod {}", modulator)?;
            }
        }
        Ok(())
    }
}
