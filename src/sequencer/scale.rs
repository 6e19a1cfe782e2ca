/// Scale catalog and scale-constrained pattern randomization
use rand::Rng;

use super::{StepStore, MAX_PITCH};

/// Range a randomized gate is drawn from
pub const RANDOM_GATE_MIN: f32 = 0.2;
pub const RANDOM_GATE_MAX: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    Major,
    NaturalMinor,
    HarmonicMinor,
    Lydian,
    Mixolydian,
    Dorian,
    Phrygian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
}

impl Scale {
    /// Catalog in selector order; a scale's id is its position here.
    pub const ALL: [Scale; 10] = [
        Scale::Major,
        Scale::NaturalMinor,
        Scale::HarmonicMinor,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
    ];

    /// Out-of-range ids clamp to the last scale in the catalog.
    pub fn from_id(id: usize) -> Self {
        Self::ALL[id.min(Self::ALL.len() - 1)]
    }

    pub fn id(self) -> usize {
        Self::ALL.iter().position(|&s| s == self).unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "Major",
            Scale::NaturalMinor => "Natural Minor",
            Scale::HarmonicMinor => "Harmonic Minor",
            Scale::Lydian => "Lydian",
            Scale::Mixolydian => "Mixolydian",
            Scale::Dorian => "Dorian",
            Scale::Phrygian => "Phrygian",
            Scale::PentatonicMajor => "Pentatonic Major",
            Scale::PentatonicMinor => "Pentatonic Minor",
            Scale::Blues => "Blues",
        }
    }

    /// Name that fits the panel display
    pub fn short_name(self) -> &'static str {
        match self {
            Scale::Major => "Major",
            Scale::NaturalMinor => "Minor",
            Scale::HarmonicMinor => "Harm Min",
            Scale::Lydian => "Lydian",
            Scale::Mixolydian => "Mixolyd",
            Scale::Dorian => "Dorian",
            Scale::Phrygian => "Phrygian",
            Scale::PentatonicMajor => "Pent Maj",
            Scale::PentatonicMinor => "Pent Min",
            Scale::Blues => "Blues",
        }
    }

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::ALL.iter().copied().find(|scale| {
            scale.name().eq_ignore_ascii_case(wanted)
                || scale.short_name().eq_ignore_ascii_case(wanted)
        })
    }
}

/// Every in-scale pitch across `octaves` octaves starting at `root`,
/// capped at the MIDI ceiling.
pub fn note_pool(root: u8, octaves: u8, scale: Scale) -> Vec<u8> {
    let mut pool = Vec::with_capacity(usize::from(octaves) * scale.intervals().len());
    for octave in 0..u16::from(octaves) {
        for &offset in scale.intervals() {
            let pitch = u16::from(root) + u16::from(offset) + 12 * octave;
            if pitch <= u16::from(MAX_PITCH) {
                pool.push(pitch as u8);
            }
        }
    }
    pool
}

/// Redraw pitch and gate of every active step from the scale's note pool.
///
/// Pitches are drawn with replacement. If the pool is empty every step gets
/// `root`. The pattern length is left alone.
pub fn randomize<R: Rng + ?Sized>(
    pattern: &mut StepStore,
    rng: &mut R,
    root: u8,
    octaves: u8,
    scale_id: usize,
) {
    let scale = Scale::from_id(scale_id);
    let pool = note_pool(root, octaves, scale);

    for index in 0..pattern.len() {
        let pitch = if pool.is_empty() {
            root.min(MAX_PITCH)
        } else {
            pool[rng.gen_range(0..pool.len())]
        };
        pattern.set_pitch(index, pitch);
        pattern.set_gate(index, rng.gen_range(RANDOM_GATE_MIN..=RANDOM_GATE_MAX));
    }

    log::debug!(
        "randomized {} steps from {} (root {}, {} octaves)",
        pattern.len(),
        scale.name(),
        root,
        octaves
    );
}
