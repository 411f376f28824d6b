//! SoundFont2 modulator records.

use std::fmt;

use super::generator::GeneratorType;

/// Curve shape of a modulator source (bits 10..15 of the source enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    Linear = 0,
    Concave = 1,
    Convex = 2,
    Switch = 3,
}

impl CurveType {
    pub const ALL: [CurveType; 4] = [
        CurveType::Linear,
        CurveType::Concave,
        CurveType::Convex,
        CurveType::Switch,
    ];

    fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            1 => CurveType::Concave,
            2 => CurveType::Convex,
            3 => CurveType::Switch,
            _ => CurveType::Linear,
        }
    }
}

/// Sources that are not MIDI continuous controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralSource {
    NoController,
    NoteOnVelocity,
    NoteOnKey,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelRange,
    /// Output of another modulator. Linked modulators are not evaluated.
    Link,
    Unknown(u8),
}

impl GeneralSource {
    fn from_index(index: u8) -> Self {
        match index {
            0 => GeneralSource::NoController,
            2 => GeneralSource::NoteOnVelocity,
            3 => GeneralSource::NoteOnKey,
            10 => GeneralSource::PolyPressure,
            13 => GeneralSource::ChannelPressure,
            14 => GeneralSource::PitchWheel,
            16 => GeneralSource::PitchWheelRange,
            127 => GeneralSource::Link,
            other => GeneralSource::Unknown(other),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            GeneralSource::NoController => 0,
            GeneralSource::NoteOnVelocity => 2,
            GeneralSource::NoteOnKey => 3,
            GeneralSource::PolyPressure => 10,
            GeneralSource::ChannelPressure => 13,
            GeneralSource::PitchWheel => 14,
            GeneralSource::PitchWheelRange => 16,
            GeneralSource::Link => 127,
            GeneralSource::Unknown(other) => other,
        }
    }
}

/// Where a modulator source reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Controller(u8),
    General(GeneralSource),
}

/// A decoded `sfModulator` source enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub curve: CurveType,
    pub bipolar: bool,
    /// Max to min instead of min to max.
    pub reversed: bool,
}

impl SourceSpec {
    /// Bit layout: index 0..6, CC flag 7, direction 8, polarity 9, curve 10..15.
    pub fn from_raw(raw: u16) -> Self {
        let index = (raw & 0x7F) as u8;
        let kind = if raw >> 7 & 1 == 1 {
            SourceKind::Controller(index)
        } else {
            SourceKind::General(GeneralSource::from_index(index))
        };
        Self {
            kind,
            curve: CurveType::from_bits(raw >> 10),
            bipolar: raw >> 9 & 1 == 1,
            reversed: raw >> 8 & 1 == 1,
        }
    }

    pub fn to_raw(&self) -> u16 {
        let (cc, index) = match self.kind {
            SourceKind::Controller(cc) => (1u16, cc as u16 & 0x7F),
            SourceKind::General(src) => (0u16, src.index() as u16 & 0x7F),
        };
        (self.curve as u16) << 10
            | (self.bipolar as u16) << 9
            | (self.reversed as u16) << 8
            | cc << 7
            | index
    }

    pub fn controller(cc: u8, curve: CurveType, bipolar: bool, reversed: bool) -> Self {
        Self {
            kind: SourceKind::Controller(cc),
            curve,
            bipolar,
            reversed,
        }
    }

    pub fn general(source: GeneralSource, curve: CurveType, bipolar: bool, reversed: bool) -> Self {
        Self {
            kind: SourceKind::General(source),
            curve,
            bipolar,
            reversed,
        }
    }

    /// The constant-one source used as an absent secondary source.
    pub fn none() -> Self {
        Self::from_raw(0)
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} {} ",
            self.curve,
            if self.bipolar { "bipolar" } else { "unipolar" },
            if self.reversed { "backwards" } else { "forwards" },
        )?;
        match self.kind {
            SourceKind::Controller(cc) => write!(f, "CC{}", cc),
            SourceKind::General(src) => write!(f, "{:?}", src),
        }
    }
}

/// Output transform applied after multiplying the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Linear,
    AbsoluteValue,
}

impl Transform {
    pub fn from_raw(raw: u16) -> Self {
        if raw == 2 {
            Transform::AbsoluteValue
        } else {
            Transform::Linear
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Transform::Linear => 0,
            Transform::AbsoluteValue => 2,
        }
    }
}

/// A modulator: `primary * secondary * amount`, added to one generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulator {
    pub source: SourceSpec,
    pub secondary: SourceSpec,
    /// `None` for destinations past the generator table (links, garbage).
    pub destination: Option<GeneratorType>,
    /// Widened so summed preset/instrument amounts do not wrap.
    pub amount: i32,
    pub transform: Transform,
}

impl Modulator {
    pub fn new(
        source: SourceSpec,
        secondary: SourceSpec,
        destination: GeneratorType,
        amount: i32,
        transform: Transform,
    ) -> Self {
        Self {
            source,
            secondary,
            destination: Some(destination),
            amount,
            transform,
        }
    }

    /// Decodes an `sfModList` record.
    pub fn from_raw(src: u16, dest: u16, amount: i16, amount_src: u16, transform: u16) -> Self {
        Self {
            source: SourceSpec::from_raw(src),
            secondary: SourceSpec::from_raw(amount_src),
            destination: GeneratorType::from_index(dest).filter(|d| d.index() <= 58),
            amount: amount as i32,
            transform: Transform::from_raw(transform),
        }
    }

    /// Same sources, destination and transform. Amounts may differ.
    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.source == other.source
            && self.secondary == other.secondary
            && self.destination == other.destination
            && self.transform == other.transform
    }

    /// Whether either source reads `kind`.
    pub fn reads(&self, kind: SourceKind) -> bool {
        self.source.kind == kind || self.secondary.kind == kind
    }

    /// Copy of `self` with `other`'s amount added.
    pub fn sum_amount(&self, other: &Modulator) -> Modulator {
        Modulator {
            amount: self.amount + other.amount,
            ..*self
        }
    }
}

impl fmt::Display for Modulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destination = self.destination.map_or("invalid", GeneratorType::name);
        write!(
            f,
            "{} x {} -> {} (amount {}, {:?})",
            self.source, self.secondary, destination, self.amount, self.transform
        )
    }
}

/// Appends each modulator of `extra` that has no identical counterpart in `list`.
pub fn add_unique_modulators(list: &mut Vec<Modulator>, extra: &[Modulator]) {
    for modulator in extra {
        if !list.iter().any(|m| m.is_identical(modulator)) {
            list.push(*modulator);
        }
    }
}

/// Layers preset modulators over instrument modulators: identical ones sum, others append.
pub fn layer_modulators(instrument: &[Modulator], preset: &[Modulator]) -> Vec<Modulator> {
    let mut merged = instrument.to_vec();
    for modulator in preset {
        match merged.iter_mut().find(|m| m.is_identical(modulator)) {
            Some(existing) => *existing = existing.sum_amount(modulator),
            None => merged.push(*modulator),
        }
    }
    merged
}

// Standard controller numbers referenced by the default modulators.
const CC_MODULATION_WHEEL: u8 = 1;
const CC_MAIN_VOLUME: u8 = 7;
const CC_PAN: u8 = 10;
const CC_EXPRESSION: u8 = 11;
const CC_FILTER_RESONANCE: u8 = 71;
const CC_RELEASE_TIME: u8 = 72;
const CC_ATTACK_TIME: u8 = 73;
const CC_BRIGHTNESS: u8 = 74;
const CC_REVERB_DEPTH: u8 = 91;
const CC_TREMOLO_DEPTH: u8 = 92;
const CC_CHORUS_DEPTH: u8 = 93;

/// Pitch wheel to fine tune, the SF2 2.04 default amount.
///
/// With a stored range of `n << 7` a full bend lands just short of n
/// semitones (127/128 of them).
pub const PITCH_WHEEL_MOD_AMOUNT: i32 = 12700;

/// The SF2 2.04 default modulators plus the engine's custom controller routings.
pub fn default_modulators() -> Vec<Modulator> {
    use CurveType::*;
    use GeneralSource::*;
    use GeneratorType as G;

    let none = SourceSpec::none();
    let cc = |n, curve, bipolar, reversed| SourceSpec::controller(n, curve, bipolar, reversed);
    let general = |s, curve, bipolar, reversed| SourceSpec::general(s, curve, bipolar, reversed);
    let linear = Transform::Linear;

    vec![
        Modulator::new(general(NoteOnVelocity, Concave, false, true), none, G::InitialAttenuation, 960, linear),
        Modulator::new(cc(CC_MODULATION_WHEEL, Linear, false, false), none, G::VibLfoToPitch, 50, linear),
        Modulator::new(cc(CC_MAIN_VOLUME, Concave, false, true), none, G::InitialAttenuation, 960, linear),
        Modulator::new(general(ChannelPressure, Linear, false, false), none, G::VibLfoToPitch, 50, linear),
        Modulator::new(
            general(PitchWheel, Linear, true, false),
            general(PitchWheelRange, Linear, false, false),
            G::FineTune,
            PITCH_WHEEL_MOD_AMOUNT,
            linear,
        ),
        Modulator::new(cc(CC_PAN, Linear, true, false), none, G::Pan, 500, linear),
        Modulator::new(cc(CC_EXPRESSION, Concave, false, true), none, G::InitialAttenuation, 960, linear),
        Modulator::new(cc(CC_REVERB_DEPTH, Linear, false, false), none, G::ReverbEffectsSend, 200, linear),
        Modulator::new(cc(CC_CHORUS_DEPTH, Linear, false, false), none, G::ChorusEffectsSend, 200, linear),
        // custom routings
        Modulator::new(general(PolyPressure, Linear, false, false), none, G::VibLfoToPitch, 50, linear),
        Modulator::new(cc(CC_TREMOLO_DEPTH, Linear, false, false), none, G::ModLfoToVolume, 24, linear),
        Modulator::new(cc(CC_ATTACK_TIME, Convex, true, false), none, G::AttackVolEnv, 6000, linear),
        Modulator::new(cc(CC_RELEASE_TIME, Linear, true, false), none, G::ReleaseVolEnv, 3600, linear),
        Modulator::new(cc(CC_BRIGHTNESS, Linear, true, false), none, G::InitialFilterFc, 6000, linear),
        Modulator::new(cc(CC_FILTER_RESONANCE, Linear, true, false), none, G::InitialFilterQ, 250, linear),
    ]
}
