//! Pitch to control-voltage mapping (1V/octave)
//!
//! Pitches are MIDI note numbers. `BASE_PITCH` sits at 0V and every 12
//! semitones above it adds one volt, up to `OUTPUT_CEILING` volts.

/// MIDI note that maps to 0V (C2)
pub const BASE_PITCH: u8 = 36;

/// Highest output, in volts (equivalently octaves above `BASE_PITCH`)
pub const OUTPUT_CEILING: f32 = 5.0;

/// Lowest pitch the output stage can represent
pub const PITCH_FLOOR: u8 = BASE_PITCH;

/// Highest pitch the output stage can represent
pub const PITCH_CEILING: u8 = BASE_PITCH + 12 * OUTPUT_CEILING as u8;

/// Octave-equivalent output level of `pitch` relative to `base_pitch`,
/// clamped to `[0, OUTPUT_CEILING]`.
pub fn pitch_to_normalized_level(pitch: u8, base_pitch: u8) -> f32 {
    let level = (f32::from(pitch) - f32::from(base_pitch)) / 12.0;
    level.clamp(0.0, OUTPUT_CEILING)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageMapper {
    base_pitch: u8,
    max_volts: f32,
}

impl VoltageMapper {
    pub fn new(base_pitch: u8, max_volts: f32) -> Self {
        let max_volts = if max_volts.is_finite() && max_volts > 0.0 {
            max_volts.min(OUTPUT_CEILING)
        } else {
            OUTPUT_CEILING
        };

        Self {
            base_pitch,
            max_volts,
        }
    }

    pub fn base_pitch(&self) -> u8 {
        self.base_pitch
    }

    pub fn max_volts(&self) -> f32 {
        self.max_volts
    }

    /// Output voltage for `pitch`
    pub fn volts(&self, pitch: u8) -> f32 {
        pitch_to_normalized_level(pitch, self.base_pitch).min(self.max_volts)
    }

    /// Duty cycle (0..1) a PWM stage should run at to produce `volts(pitch)`
    pub fn duty(&self, pitch: u8) -> f32 {
        self.volts(pitch) / self.max_volts
    }

    /// Highest pitch this mapper can reach without clamping
    pub fn ceiling_pitch(&self) -> u8 {
        let span = (self.max_volts * 12.0).floor() as u16;
        (u16::from(self.base_pitch) + span).min(127) as u8
    }
}

impl Default for VoltageMapper {
    fn default() -> Self {
        Self::new(BASE_PITCH, OUTPUT_CEILING)
    }
}
