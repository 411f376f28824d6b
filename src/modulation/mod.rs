//! Modulator evaluation: controller state + voice context → generator offsets.

pub mod controllers;
pub mod curves;

use crate::bank::generator::{GeneratorSet, GeneratorType};
use crate::bank::modulator::{GeneralSource, Modulator, SourceKind, SourceSpec, Transform};

use self::controllers::{ControllerSlot, ControllerTable};
use self::curves::CurveTables;

/// Raw value of the constant "no controller" source.
const NO_CONTROLLER_RAW: u16 = 16383;

// CC91 / CC93, linear unipolar forwards: the reverb and chorus depth routings.
const REVERB_SOURCE_RAW: u16 = 0x00DB;
const CHORUS_SOURCE_RAW: u16 = 0x00DD;
const EFFECT_AMOUNT_MULTIPLIER: i32 = 5;
const EFFECT_AMOUNT_MAX: i32 = 1000;

/// Per-voice modulator sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSourceContext {
    pub key: u8,
    pub velocity: u8,
    pub poly_pressure: u8,
}

/// Evaluates modulator lists against precomputed transform curves.
#[derive(Debug, Clone, Default)]
pub struct ModulatorEngine {
    curves: CurveTables,
}

impl ModulatorEngine {
    pub fn new() -> Self {
        Self {
            curves: CurveTables::new(),
        }
    }

    pub fn curves(&self) -> &CurveTables {
        &self.curves
    }

    /// Transformed value of one source, or `None` for a link source.
    #[inline]
    fn source_value(&self, spec: &SourceSpec, table: &ControllerTable, ctx: &VoiceSourceContext) -> Option<f32> {
        let raw = match spec.kind {
            SourceKind::General(GeneralSource::NoController) => NO_CONTROLLER_RAW,
            SourceKind::General(GeneralSource::NoteOnKey) => (ctx.key as u16) << 7,
            SourceKind::General(GeneralSource::NoteOnVelocity) => (ctx.velocity as u16) << 7,
            SourceKind::General(GeneralSource::PolyPressure) => (ctx.poly_pressure as u16) << 7,
            SourceKind::General(GeneralSource::Link) => return None,
            SourceKind::General(GeneralSource::Unknown(_)) => 0,
            kind => ControllerSlot::for_source(kind).map_or(0, |slot| table.get(slot)),
        };
        Some(self.curves.lookup(spec, raw))
    }

    /// `primary * secondary * amount`, absolute when the transform asks for it.
    ///
    /// A zero amount contributes zero without reading any source.
    pub fn compute_modulator(&self, table: &ControllerTable, modulator: &Modulator, ctx: &VoiceSourceContext) -> f32 {
        if modulator.amount == 0 {
            return 0.0;
        }
        let (Some(primary), Some(secondary)) = (
            self.source_value(&modulator.source, table, ctx),
            self.source_value(&modulator.secondary, table, ctx),
        ) else {
            return 0.0;
        };

        let value = primary * secondary * effective_amount(modulator) as f32;
        match modulator.transform {
            Transform::AbsoluteValue => value.abs(),
            Transform::Linear => value,
        }
    }

    /// Rebuilds `modulated` from the static `generators` plus every modulator.
    ///
    /// Each contribution is added in list order; the slot is truncated and
    /// clamped to its generator limits after every addition.
    pub fn compute_modulators(
        &self,
        modulators: &[Modulator],
        generators: &GeneratorSet,
        modulated: &mut GeneratorSet,
        table: &ControllerTable,
        ctx: &VoiceSourceContext,
    ) {
        *modulated = *generators;
        for modulator in modulators {
            let Some(destination) = modulator.destination else {
                continue;
            };
            let value = self.compute_modulator(table, modulator, ctx);
            accumulate(modulated, destination, value);
        }
    }

    /// Recomputes only the destinations fed by a modulator reading `source`.
    ///
    /// Every modulator of a touched destination is re-evaluated, so the slot
    /// ends up equal to what `compute_modulators` would produce. Returns the
    /// touched destinations as a bitmask over generator indices.
    pub fn compute_modulators_for_source(
        &self,
        modulators: &[Modulator],
        generators: &GeneratorSet,
        modulated: &mut GeneratorSet,
        table: &ControllerTable,
        ctx: &VoiceSourceContext,
        source: SourceKind,
    ) -> u64 {
        let mut touched = 0u64;
        for modulator in modulators.iter().filter(|m| m.reads(source)) {
            let Some(destination) = modulator.destination else {
                continue;
            };
            let bit = 1u64 << destination.index();
            if touched & bit != 0 {
                continue;
            }
            touched |= bit;

            modulated[destination.index()] = generators[destination.index()];
            for m in modulators.iter().filter(|m| m.destination == Some(destination)) {
                let value = self.compute_modulator(table, m, ctx);
                accumulate(modulated, destination, value);
            }
        }
        touched
    }
}

#[inline]
fn accumulate(modulated: &mut GeneratorSet, destination: GeneratorType, value: f32) {
    let slot = &mut modulated[destination.index()];
    *slot = destination.clamp((*slot as f32 + value) as i32);
}

/// Reverb and chorus depth routings are boosted; the SF2 default amount of
/// 200 is barely audible.
fn effective_amount(modulator: &Modulator) -> i32 {
    let is_effect = matches!(modulator.source.to_raw(), REVERB_SOURCE_RAW | CHORUS_SOURCE_RAW)
        && modulator.secondary.to_raw() == 0
        && matches!(
            modulator.destination,
            Some(GeneratorType::ReverbEffectsSend | GeneratorType::ChorusEffectsSend)
        );
    if is_effect && modulator.amount <= EFFECT_AMOUNT_MAX {
        (modulator.amount * EFFECT_AMOUNT_MULTIPLIER).min(EFFECT_AMOUNT_MAX)
    } else {
        modulator.amount
    }
}

/// Whether any bit of a destination mask is a volume-envelope input.
pub fn touches_volume_envelope(mask: u64) -> bool {
    GeneratorType::ALL
        .iter()
        .any(|g| g.feeds_volume_envelope() && mask & (1u64 << g.index()) != 0)
}

#[cfg(test)]
mod tests {
    use super::controllers::cc;
    use super::*;
    use crate::bank::generator::default_generators;
    use crate::bank::modulator::{default_modulators, CurveType};
    use approx::assert_abs_diff_eq;

    fn ctx() -> VoiceSourceContext {
        VoiceSourceContext {
            key: 60,
            velocity: 100,
            poly_pressure: 0,
        }
    }

    fn cc_mod(n: u8, destination: GeneratorType, amount: i32) -> Modulator {
        Modulator::new(
            SourceSpec::controller(n, CurveType::Linear, false, false),
            SourceSpec::none(),
            destination,
            amount,
            Transform::Linear,
        )
    }

    #[test]
    fn zero_amount_always_contributes_zero() {
        let engine = ModulatorEngine::new();
        let mut table = ControllerTable::new();
        let m = cc_mod(cc::MODULATION_WHEEL, GeneratorType::VibLfoToPitch, 0);
        for value in [0u8, 1, 64, 127] {
            table.set_cc(cc::MODULATION_WHEEL, value);
            assert_eq!(engine.compute_modulator(&table, &m, &ctx()), 0.0);
        }
        let none = Modulator::new(SourceSpec::none(), SourceSpec::none(), GeneratorType::Pan, 0, Transform::Linear);
        assert_eq!(engine.compute_modulator(&table, &none, &ctx()), 0.0);
    }

    #[test]
    fn pitch_wheel_at_max_bends_by_the_range() {
        let engine = ModulatorEngine::new();
        let mut table = ControllerTable::new();
        let wheel = default_modulators()[4];
        assert_abs_diff_eq!(engine.compute_modulator(&table, &wheel, &ctx()), 0.0);
        table.set(ControllerSlot::PitchWheel, 16383);
        let cents = engine.compute_modulator(&table, &wheel, &ctx());
        // 12700 * (16383 / 8192 - 1) * 256 / 16384
        let expected = 12700.0 * (16383.0 / 8192.0 - 1.0) * 256.0 / 16384.0;
        assert!((cents - expected).abs() < 0.05, "expected ~198.4 cents, got {}", cents);
        assert_eq!(wheel.amount, 12700);
    }

    #[test]
    fn absolute_transform_drops_the_sign() {
        let engine = ModulatorEngine::new();
        let table = ControllerTable::new();
        let mut m = Modulator::new(
            SourceSpec::controller(cc::MODULATION_WHEEL, CurveType::Linear, true, false),
            SourceSpec::none(),
            GeneratorType::Pan,
            100,
            Transform::Linear,
        );
        assert!(engine.compute_modulator(&table, &m, &ctx()) < 0.0);
        m.transform = Transform::AbsoluteValue;
        assert!(engine.compute_modulator(&table, &m, &ctx()) > 0.0);
    }

    #[test]
    fn link_sources_contribute_nothing() {
        let engine = ModulatorEngine::new();
        let table = ControllerTable::new();
        let m = Modulator::new(
            SourceSpec::general(GeneralSource::Link, CurveType::Linear, false, false),
            SourceSpec::none(),
            GeneratorType::Pan,
            500,
            Transform::Linear,
        );
        assert_eq!(engine.compute_modulator(&table, &m, &ctx()), 0.0);
    }

    #[test]
    fn reverb_depth_is_boosted() {
        let engine = ModulatorEngine::new();
        let mut table = ControllerTable::new();
        table.set_cc(91, 127);
        let reverb = default_modulators()[7];
        let value = engine.compute_modulator(&table, &reverb, &ctx());
        assert!(value > 990.0 && value <= 1000.0, "got {}", value);
    }

    #[test]
    fn destinations_clamp_to_generator_limits() {
        let engine = ModulatorEngine::new();
        let mut table = ControllerTable::new();
        table.set_cc(cc::MODULATION_WHEEL, 127);
        let mods = [
            cc_mod(cc::MODULATION_WHEEL, GeneratorType::Pan, 800),
            cc_mod(cc::MODULATION_WHEEL, GeneratorType::Pan, -100),
        ];
        let generators = default_generators();
        let mut modulated = generators;
        engine.compute_modulators(&mods, &generators, &mut modulated, &table, &ctx());
        // 799 clamps to 500 before the -100 lands
        assert_eq!(modulated[GeneratorType::Pan.index()], 400);
    }

    #[test]
    fn incremental_update_matches_full_recompute() {
        let engine = ModulatorEngine::new();
        let mut table = ControllerTable::new();
        let mut mods = default_modulators();
        mods.push(cc_mod(cc::MODULATION_WHEEL, GeneratorType::InitialFilterFc, -2400));
        let mut generators = default_generators();
        generators[GeneratorType::InitialAttenuation.index()] = 100;

        let mut incremental = generators;
        engine.compute_modulators(&mods, &generators, &mut incremental, &table, &ctx());

        for (n, value) in [(cc::MAIN_VOLUME, 30u8), (cc::MODULATION_WHEEL, 90), (cc::BRIGHTNESS, 10)] {
            table.set_cc(n, value);
            engine.compute_modulators_for_source(
                &mods,
                &generators,
                &mut incremental,
                &table,
                &ctx(),
                SourceKind::Controller(n),
            );
            let mut full = generators;
            engine.compute_modulators(&mods, &generators, &mut full, &table, &ctx());
            assert_eq!(incremental, full, "mismatch after CC{}", n);
        }
    }

    #[test]
    fn volume_changes_flag_the_envelope() {
        let engine = ModulatorEngine::new();
        let table = ControllerTable::new();
        let mods = default_modulators();
        let generators = default_generators();
        let mut modulated = generators;
        let mask = engine.compute_modulators_for_source(
            &mods,
            &generators,
            &mut modulated,
            &table,
            &ctx(),
            SourceKind::Controller(cc::MAIN_VOLUME),
        );
        assert!(touches_volume_envelope(mask));
        let mask = engine.compute_modulators_for_source(
            &mods,
            &generators,
            &mut modulated,
            &table,
            &ctx(),
            SourceKind::Controller(cc::PAN),
        );
        assert!(!touches_volume_envelope(mask));
        assert_eq!(mask, 1 << GeneratorType::Pan.index());
    }
}
