//! SoundFont2 generators: the numeric synthesis parameters of a zone.

/*
Generators
==========

A generator is a (type, value) pair. Every zone carries a short list of them,
and a playing voice carries one dense slot per type:

    slot   0 .. 59      one i32 per generator type
    type   0 .. 58      the SF2 2.04 enumeration (59 is an unused marker)

Resolution
----------

A voice gets its static generator set by merging one instrument zone with
one preset zone:

    value = (instrument value, or the type's default) + (preset value, or 0)
    value = clamp(value, min(type), max(type))

Preset generators are offsets; instrument generators are absolutes. The
limits are fixed per type.

Units
-----

    timecents   seconds = 2^(tc / 1200)           envelope and LFO timing
    abs cents   Hz = 440 * 2^((c - 6900) / 1200)  filter cutoff, LFO rate
    centibels   dB * 10                            attenuation, sustain
    0.1 %       1000 = 100 %                       effect sends, mod sustain
*/

use std::fmt;

/// Number of dense generator slots held by a voice.
pub const GENERATOR_COUNT: usize = 60;

/// A dense per-voice generator array, indexed by `GeneratorType::index`.
pub type GeneratorSet = [i32; GENERATOR_COUNT];

/// The SF2 generator enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartLoopAddrsOffset = 2,
    EndLoopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeyNumToModEnvHold = 31,
    KeyNumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeyNumToVolEnvHold = 39,
    KeyNumToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartLoopAddrsCoarseOffset = 45,
    KeyNum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndLoopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
}

/// Valid range and default of one generator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorLimits {
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

const fn lim(min: i32, max: i32, default: i32) -> GeneratorLimits {
    GeneratorLimits { min, max, default }
}

// Unused, reserved and zone-selecting slots collapse to zero in a voice.
const NONE: GeneratorLimits = lim(0, 0, 0);

static LIMITS: [GeneratorLimits; GENERATOR_COUNT] = [
    lim(0, 32768, 0),           // startAddrsOffset
    lim(-32768, 32768, 0),      // endAddrsOffset
    lim(-32768, 32768, 0),      // startloopAddrsOffset
    lim(-32768, 32768, 0),      // endloopAddrsOffset
    lim(0, 32768, 0),           // startAddrsCoarseOffset
    lim(-12000, 12000, 0),      // modLfoToPitch
    lim(-12000, 12000, 0),      // vibLfoToPitch
    lim(-12000, 12000, 0),      // modEnvToPitch
    lim(1500, 13500, 13500),    // initialFilterFc
    lim(0, 960, 0),             // initialFilterQ
    lim(-12000, 12000, 0),      // modLfoToFilterFc
    lim(-12000, 12000, 0),      // modEnvToFilterFc
    lim(-32768, 32768, 0),      // endAddrsCoarseOffset
    lim(-960, 960, 0),          // modLfoToVolume
    NONE,                       // unused1
    lim(0, 1000, 0),            // chorusEffectsSend
    lim(0, 1000, 0),            // reverbEffectsSend
    lim(-500, 500, 0),          // pan
    NONE,                       // unused2
    NONE,                       // unused3
    NONE,                       // unused4
    lim(-12000, 5000, -12000),  // delayModLFO
    lim(-16000, 4500, 0),       // freqModLFO
    lim(-12000, 5000, -12000),  // delayVibLFO
    lim(-16000, 4500, 0),       // freqVibLFO
    lim(-12000, 5000, -12000),  // delayModEnv
    lim(-12000, 8000, -12000),  // attackModEnv
    lim(-12000, 5000, -12000),  // holdModEnv
    lim(-12000, 8000, -12000),  // decayModEnv
    lim(0, 1000, 0),            // sustainModEnv
    lim(-12000, 8000, -12000),  // releaseModEnv
    lim(-1200, 1200, 0),        // keyNumToModEnvHold
    lim(-1200, 1200, 0),        // keyNumToModEnvDecay
    lim(-12000, 5000, -12000),  // delayVolEnv
    lim(-12000, 8000, -12000),  // attackVolEnv
    lim(-12000, 5000, -12000),  // holdVolEnv
    lim(-12000, 8000, -12000),  // decayVolEnv
    lim(0, 1440, 0),            // sustainVolEnv
    lim(-12000, 8000, -12000),  // releaseVolEnv
    lim(-1200, 1200, 0),        // keyNumToVolEnvHold
    lim(-1200, 1200, 0),        // keyNumToVolEnvDecay
    NONE,                       // instrument
    NONE,                       // reserved1
    NONE,                       // keyRange
    NONE,                       // velRange
    lim(-32768, 32768, 0),      // startloopAddrsCoarseOffset
    lim(-1, 127, -1),           // keyNum
    lim(-1, 127, -1),           // velocity
    lim(-2500, 1440, 0),        // initialAttenuation, pre EMU 0.4 correction
    NONE,                       // reserved2
    lim(-32768, 32768, 0),      // endloopAddrsCoarseOffset
    lim(-120, 120, 0),          // coarseTune
    lim(-12700, 12700, 0),      // fineTune
    NONE,                       // sampleID
    lim(0, 3, 0),               // sampleModes
    NONE,                       // reserved3
    lim(0, 1200, 100),          // scaleTuning
    lim(0, 99999, 0),           // exclusiveClass
    lim(-1, 127, -1),           // overridingRootKey
    NONE,                       // unused5
];

static NAMES: [&str; GENERATOR_COUNT] = [
    "startAddrsOffset",
    "endAddrsOffset",
    "startloopAddrsOffset",
    "endloopAddrsOffset",
    "startAddrsCoarseOffset",
    "modLfoToPitch",
    "vibLfoToPitch",
    "modEnvToPitch",
    "initialFilterFc",
    "initialFilterQ",
    "modLfoToFilterFc",
    "modEnvToFilterFc",
    "endAddrsCoarseOffset",
    "modLfoToVolume",
    "unused1",
    "chorusEffectsSend",
    "reverbEffectsSend",
    "pan",
    "unused2",
    "unused3",
    "unused4",
    "delayModLFO",
    "freqModLFO",
    "delayVibLFO",
    "freqVibLFO",
    "delayModEnv",
    "attackModEnv",
    "holdModEnv",
    "decayModEnv",
    "sustainModEnv",
    "releaseModEnv",
    "keyNumToModEnvHold",
    "keyNumToModEnvDecay",
    "delayVolEnv",
    "attackVolEnv",
    "holdVolEnv",
    "decayVolEnv",
    "sustainVolEnv",
    "releaseVolEnv",
    "keyNumToVolEnvHold",
    "keyNumToVolEnvDecay",
    "instrument",
    "reserved1",
    "keyRange",
    "velRange",
    "startloopAddrsCoarseOffset",
    "keyNum",
    "velocity",
    "initialAttenuation",
    "reserved2",
    "endloopAddrsCoarseOffset",
    "coarseTune",
    "fineTune",
    "sampleID",
    "sampleModes",
    "reserved3",
    "scaleTuning",
    "exclusiveClass",
    "overridingRootKey",
    "unused5",
];

impl GeneratorType {
    /// Every generator type in slot order.
    pub const ALL: [GeneratorType; GENERATOR_COUNT] = {
        use GeneratorType::*;
        [
            StartAddrsOffset,
            EndAddrsOffset,
            StartLoopAddrsOffset,
            EndLoopAddrsOffset,
            StartAddrsCoarseOffset,
            ModLfoToPitch,
            VibLfoToPitch,
            ModEnvToPitch,
            InitialFilterFc,
            InitialFilterQ,
            ModLfoToFilterFc,
            ModEnvToFilterFc,
            EndAddrsCoarseOffset,
            ModLfoToVolume,
            Unused1,
            ChorusEffectsSend,
            ReverbEffectsSend,
            Pan,
            Unused2,
            Unused3,
            Unused4,
            DelayModLfo,
            FreqModLfo,
            DelayVibLfo,
            FreqVibLfo,
            DelayModEnv,
            AttackModEnv,
            HoldModEnv,
            DecayModEnv,
            SustainModEnv,
            ReleaseModEnv,
            KeyNumToModEnvHold,
            KeyNumToModEnvDecay,
            DelayVolEnv,
            AttackVolEnv,
            HoldVolEnv,
            DecayVolEnv,
            SustainVolEnv,
            ReleaseVolEnv,
            KeyNumToVolEnvHold,
            KeyNumToVolEnvDecay,
            Instrument,
            Reserved1,
            KeyRange,
            VelRange,
            StartLoopAddrsCoarseOffset,
            KeyNum,
            Velocity,
            InitialAttenuation,
            Reserved2,
            EndLoopAddrsCoarseOffset,
            CoarseTune,
            FineTune,
            SampleId,
            SampleModes,
            Reserved3,
            ScaleTuning,
            ExclusiveClass,
            OverridingRootKey,
            Unused5,
        ]
    };

    /// Maps a raw `sfGenOper` to a type. Operators past the table are not generators.
    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn limits(self) -> GeneratorLimits {
        LIMITS[self.index()]
    }

    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }

    #[inline]
    pub fn clamp(self, value: i32) -> i32 {
        let limits = self.limits();
        value.clamp(limits.min, limits.max)
    }

    /// Generators whose change requires the volume envelope timing to be rebuilt.
    pub fn feeds_volume_envelope(self) -> bool {
        matches!(
            self,
            GeneratorType::InitialAttenuation
                | GeneratorType::DelayVolEnv
                | GeneratorType::AttackVolEnv
                | GeneratorType::HoldVolEnv
                | GeneratorType::DecayVolEnv
                | GeneratorType::SustainVolEnv
                | GeneratorType::ReleaseVolEnv
                | GeneratorType::KeyNumToVolEnvHold
                | GeneratorType::KeyNumToVolEnvDecay
        )
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One generator record of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    pub kind: GeneratorType,
    pub value: i16,
}

impl Generator {
    pub fn new(kind: GeneratorType, value: i16) -> Self {
        Self { kind, value }
    }

    /// Low byte of a range amount (keyRange / velRange).
    pub fn range_low(&self) -> u8 {
        (self.value as u16 & 0xFF) as u8
    }

    /// High byte of a range amount (keyRange / velRange).
    pub fn range_high(&self) -> u8 {
        ((self.value as u16 >> 8) & 0xFF) as u8
    }
}

/// Finds the value of `kind` in a zone's generator list.
pub fn find_generator(generators: &[Generator], kind: GeneratorType) -> Option<i16> {
    generators.iter().find(|g| g.kind == kind).map(|g| g.value)
}

/// Merges one generator type from an instrument zone and a preset zone.
///
/// The instrument level falls back to the type default, the preset level to 0.
#[inline]
pub fn resolve_generator(kind: GeneratorType, instrument: Option<i16>, preset: Option<i16>) -> i32 {
    let base = instrument.map_or(kind.limits().default, i32::from);
    let offset = preset.map_or(0, i32::from);
    kind.clamp(base + offset)
}

/// Builds the dense static generator set for one (instrument zone, preset zone) layer.
pub fn resolve_generators(instrument: &[Generator], preset: &[Generator]) -> GeneratorSet {
    let mut set = [0; GENERATOR_COUNT];
    for kind in GeneratorType::ALL {
        set[kind.index()] = resolve_generator(
            kind,
            find_generator(instrument, kind),
            find_generator(preset, kind),
        );
    }
    set
}

/// Dense set holding every type's default value.
pub fn default_generators() -> GeneratorSet {
    let mut set = [0; GENERATOR_COUNT];
    for kind in GeneratorType::ALL {
        set[kind.index()] = kind.limits().default;
    }
    set
}
