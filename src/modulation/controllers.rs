//! Per-channel controller state read by modulators.

/*
Controller Table
================

Every modulator source resolves to a 14-bit raw value (0..16383). MIDI
continuous controllers are 7-bit on the wire, so they are stored shifted:

    stored = value << 7

An LSB controller (CC 33..63) fills the low 7 bits of its MSB partner,
which gives the full 14-bit resolution to hardware that sends both.

Three channel-wide sources are not controllers at all: channel pressure,
the pitch wheel and the pitch-wheel range. They live in named fields
next to the 128-slot array; `ControllerSlot` maps a modulator source onto
either place.
*/

use crate::bank::modulator::{GeneralSource, SourceKind};

pub const CONTROLLER_COUNT: usize = 128;

/// Standard MIDI controller numbers the engine interprets.
pub mod cc {
    pub const BANK_SELECT: u8 = 0;
    pub const MODULATION_WHEEL: u8 = 1;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const MAIN_VOLUME: u8 = 7;
    pub const BALANCE: u8 = 8;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const LSB_FIRST: u8 = 33;
    pub const LSB_LAST: u8 = 63;
    pub const SUSTAIN_PEDAL: u8 = 64;
    pub const FILTER_RESONANCE: u8 = 71;
    pub const RELEASE_TIME: u8 = 72;
    pub const ATTACK_TIME: u8 = 73;
    pub const BRIGHTNESS: u8 = 74;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Pitch wheel center.
pub const PITCH_WHEEL_CENTER: u16 = 8192;
/// Default pitch-wheel range: 2 semitones, stored like a controller.
pub const DEFAULT_PITCH_WHEEL_RANGE: u16 = 2 << 7;

/// Channel-wide sources that are not MIDI controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonCcSources {
    pub channel_pressure: u16,
    pub pitch_wheel: u16,
    /// Semitones in the high 7 bits, 1/128 semitone in the low ones.
    pub pitch_wheel_range: u16,
}

impl Default for NonCcSources {
    fn default() -> Self {
        Self {
            channel_pressure: 0,
            pitch_wheel: PITCH_WHEEL_CENTER,
            pitch_wheel_range: DEFAULT_PITCH_WHEEL_RANGE,
        }
    }
}

/// Where a modulator source lives in a channel's controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerSlot {
    Cc(u8),
    ChannelPressure,
    PitchWheel,
    PitchWheelRange,
}

impl ControllerSlot {
    /// The channel slot read by `kind`, or `None` for per-voice and constant sources.
    pub fn for_source(kind: SourceKind) -> Option<Self> {
        match kind {
            SourceKind::Controller(n) => Some(ControllerSlot::Cc(n)),
            SourceKind::General(GeneralSource::ChannelPressure) => Some(ControllerSlot::ChannelPressure),
            SourceKind::General(GeneralSource::PitchWheel) => Some(ControllerSlot::PitchWheel),
            SourceKind::General(GeneralSource::PitchWheelRange) => Some(ControllerSlot::PitchWheelRange),
            SourceKind::General(_) => None,
        }
    }

    /// The modulator source that reads this slot.
    pub fn source(self) -> SourceKind {
        match self {
            ControllerSlot::Cc(n) => SourceKind::Controller(n),
            ControllerSlot::ChannelPressure => SourceKind::General(GeneralSource::ChannelPressure),
            ControllerSlot::PitchWheel => SourceKind::General(GeneralSource::PitchWheel),
            ControllerSlot::PitchWheelRange => SourceKind::General(GeneralSource::PitchWheelRange),
        }
    }
}

fn default_controllers() -> [u16; CONTROLLER_COUNT] {
    let mut table = [0u16; CONTROLLER_COUNT];
    let mut set = |n: u8, v: u16| table[n as usize] = v << 7;
    set(cc::MAIN_VOLUME, 100);
    set(cc::BALANCE, 64);
    set(cc::PAN, 64);
    set(cc::EXPRESSION, 127);
    // sound controllers 71..79 rest at their center
    for n in 71..=79 {
        set(n, 64);
    }
    set(cc::NRPN_LSB, 127);
    set(cc::NRPN_MSB, 127);
    set(cc::RPN_LSB, 127);
    set(cc::RPN_MSB, 127);
    table
}

/// 14-bit controller values of one channel plus its non-controller sources.
#[derive(Debug, Clone)]
pub struct ControllerTable {
    values: [u16; CONTROLLER_COUNT],
    non_cc: NonCcSources,
    locked: [bool; CONTROLLER_COUNT],
}

impl ControllerTable {
    pub fn new() -> Self {
        Self {
            values: default_controllers(),
            non_cc: NonCcSources::default(),
            locked: [false; CONTROLLER_COUNT],
        }
    }

    #[inline]
    pub fn get(&self, slot: ControllerSlot) -> u16 {
        match slot {
            ControllerSlot::Cc(n) => self.values[(n & 0x7F) as usize],
            ControllerSlot::ChannelPressure => self.non_cc.channel_pressure,
            ControllerSlot::PitchWheel => self.non_cc.pitch_wheel,
            ControllerSlot::PitchWheelRange => self.non_cc.pitch_wheel_range,
        }
    }

    /// Stores a raw 14-bit value. Locked controllers keep their value.
    pub fn set(&mut self, slot: ControllerSlot, raw: u16) {
        let raw = raw.min(16383);
        match slot {
            ControllerSlot::Cc(n) => {
                if !self.is_locked(n) {
                    self.values[(n & 0x7F) as usize] = raw;
                }
            }
            ControllerSlot::ChannelPressure => self.non_cc.channel_pressure = raw,
            ControllerSlot::PitchWheel => self.non_cc.pitch_wheel = raw,
            ControllerSlot::PitchWheelRange => self.non_cc.pitch_wheel_range = raw,
        }
    }

    /// The 7-bit value of controller `n`.
    pub fn cc(&self, n: u8) -> u8 {
        (self.get(ControllerSlot::Cc(n)) >> 7) as u8
    }

    /// Stores a 7-bit controller value as `value << 7`.
    pub fn set_cc(&mut self, n: u8, value: u8) {
        self.set(ControllerSlot::Cc(n), ((value & 0x7F) as u16) << 7);
    }

    /// Replaces the low 7 bits of MSB controller `msb`.
    pub fn set_lsb(&mut self, msb: u8, value: u8) {
        let current = self.get(ControllerSlot::Cc(msb));
        self.set(ControllerSlot::Cc(msb), (current & 0x3F80) | (value & 0x7F) as u16);
    }

    pub fn non_cc(&self) -> &NonCcSources {
        &self.non_cc
    }

    pub fn lock(&mut self, n: u8, locked: bool) {
        self.locked[(n & 0x7F) as usize] = locked;
    }

    pub fn is_locked(&self, n: u8) -> bool {
        self.locked[(n & 0x7F) as usize]
    }

    /// Restores the reset values of every unlocked controller and the non-CC sources.
    pub fn reset(&mut self) {
        let defaults = default_controllers();
        for (n, (value, default)) in self.values.iter_mut().zip(defaults).enumerate() {
            if !self.locked[n] {
                *value = default;
            }
        }
        self.non_cc = NonCcSources::default();
    }

    /// Pitch-wheel range in semitones, fractional part included.
    pub fn pitch_wheel_range_semitones(&self) -> f32 {
        self.non_cc.pitch_wheel_range as f32 / 128.0
    }
}

impl Default for ControllerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel tuning state set through RPNs and the control handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomControllers {
    /// Fine channel tuning in cents.
    pub tuning_cents: f32,
    /// Coarse channel tuning in semitones (RPN 2).
    pub tuning_semitones: i32,
    /// Whole-semitone transpose applied to the key at note-on.
    pub transpose_semitones: i32,
    /// Fractional part of the transpose, in cents.
    pub transpose_fine: f32,
    /// Scales vibrato and mod-LFO pitch depth.
    pub modulation_multiplier: f32,
}

impl Default for CustomControllers {
    fn default() -> Self {
        Self {
            tuning_cents: 0.0,
            tuning_semitones: 0,
            transpose_semitones: 0,
            transpose_fine: 0.0,
            modulation_multiplier: 1.0,
        }
    }
}

/// Channel-level vibrato layered on top of the generator-driven one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelVibrato {
    /// Cents.
    pub depth: f32,
    /// Hz.
    pub rate: f32,
    /// Seconds after note-on.
    pub delay: f32,
}
