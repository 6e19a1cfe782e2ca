/// Core sequencer logic - step storage and pattern editing
/// Playback timing lives in `clock`, scales and randomization in `scale`
use crate::voltage::{PITCH_CEILING, PITCH_FLOOR};

pub mod clock;
pub mod playback;
pub mod presets;
pub mod scale;

/// Highest valid pitch (MIDI range)
pub const MAX_PITCH: u8 = 127;

/// Pitch of a step that has never been written
pub const DEFAULT_PITCH: u8 = 0;

/// Gate fraction used for cleared steps and degenerate reads
pub const DEFAULT_GATE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub pitch: u8,
    pub gate: f32,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            pitch: DEFAULT_PITCH,
            gate: DEFAULT_GATE,
        }
    }
}

/// Fixed-capacity pattern of steps.
///
/// Only the first `len()` steps take part in playback. Steps past the end keep
/// whatever they held and come back if the pattern is lengthened again.
#[derive(Debug, Clone, PartialEq)]
pub struct StepStore {
    steps: Box<[Step]>,
    active_len: usize,
}

impl StepStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            steps: vec![Step::default(); capacity].into_boxed_slice(),
            active_len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.steps.len()
    }

    pub fn len(&self) -> usize {
        self.active_len
    }

    pub fn is_empty(&self) -> bool {
        self.active_len == 0
    }

    pub fn is_active(&self, index: usize) -> bool {
        index < self.active_len
    }

    pub fn set_len(&mut self, len: usize) {
        if len <= self.capacity() {
            self.active_len = len;
        }
    }

    pub fn step(&self, index: usize) -> Option<Step> {
        self.steps.get(index).copied()
    }

    /// Active steps in playback order
    pub fn active_steps(&self) -> &[Step] {
        &self.steps[..self.active_len]
    }

    pub fn pitch(&self, index: usize) -> u8 {
        self.steps
            .get(index)
            .map(|step| step.pitch)
            .unwrap_or(DEFAULT_PITCH)
    }

    /// Writing past the current end extends the pattern to include `index`.
    pub fn set_pitch(&mut self, index: usize, pitch: u8) {
        if pitch > MAX_PITCH {
            return;
        }
        if let Some(step) = self.steps.get_mut(index) {
            step.pitch = pitch;
            if index >= self.active_len {
                self.active_len = index + 1;
            }
        }
    }

    pub fn gate(&self, index: usize) -> f32 {
        self.steps
            .get(index)
            .map(|step| step.gate)
            .unwrap_or(DEFAULT_GATE)
    }

    pub fn set_gate(&mut self, index: usize, gate: f32) {
        if let Some(step) = self.steps.get_mut(index) {
            step.gate = clamp_gate(gate);
        }
    }

    /// Overwrite the pattern with `pitches`, truncated to capacity.
    pub fn load_pitches(&mut self, pitches: &[u8]) {
        let count = pitches.len().min(self.capacity());
        for (step, &pitch) in self.steps.iter_mut().zip(&pitches[..count]) {
            step.pitch = pitch.min(MAX_PITCH);
        }
        self.active_len = count;
    }

    pub fn load_gates(&mut self, gates: &[f32]) {
        for (step, &gate) in self.steps.iter_mut().zip(gates) {
            step.gate = clamp_gate(gate);
        }
    }

    /// Pitch of every slot, active or not
    pub fn pitches(&self) -> Box<[u8]> {
        self.steps.iter().map(|step| step.pitch).collect()
    }

    /// Put back pitches taken with `pitches`. The active length is left alone.
    pub fn restore_pitches(&mut self, pitches: &[u8]) {
        for (step, &pitch) in self.steps.iter_mut().zip(pitches) {
            step.pitch = pitch.min(MAX_PITCH);
        }
    }

    pub fn clear(&mut self) {
        for step in self.steps.iter_mut() {
            *step = Step::default();
        }
        self.active_len = 0;
    }

    pub fn next_index(&self, index: usize) -> usize {
        if self.active_len == 0 {
            return 0;
        }
        (index + 1) % self.active_len
    }

    pub fn previous_index(&self, index: usize) -> usize {
        if self.active_len == 0 {
            return 0;
        }
        (index % self.active_len + self.active_len - 1) % self.active_len
    }

    /// Shift every written active step by the same amount.
    ///
    /// The shift is reduced so the pattern's lowest and highest pitches stay
    /// inside `[PITCH_FLOOR, PITCH_CEILING]`. Returns the shift applied.
    pub fn transpose(&mut self, semitones: i32) -> i32 {
        let written = self.active_steps().iter().filter(|s| s.pitch != DEFAULT_PITCH);
        let (lowest, highest) = written.fold((None::<u8>, None::<u8>), |(lo, hi), s| {
            (
                Some(lo.map_or(s.pitch, |lo| lo.min(s.pitch))),
                Some(hi.map_or(s.pitch, |hi| hi.max(s.pitch))),
            )
        });
        let (Some(lowest), Some(highest)) = (lowest, highest) else {
            return 0;
        };

        let shift = if semitones > 0 {
            semitones.min((i32::from(PITCH_CEILING) - i32::from(highest)).max(0))
        } else {
            semitones.max((i32::from(PITCH_FLOOR) - i32::from(lowest)).min(0))
        };
        if shift == 0 {
            return 0;
        }

        let len = self.active_len;
        for step in self.steps[..len].iter_mut() {
            if step.pitch != DEFAULT_PITCH {
                step.pitch = (i32::from(step.pitch) + shift) as u8;
            }
        }
        shift
    }
}

fn clamp_gate(gate: f32) -> f32 {
    if gate.is_nan() {
        return DEFAULT_GATE;
    }
    gate.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(pitches: &[u8]) -> StepStore {
        let mut store = StepStore::new(16);
        store.load_pitches(pitches);
        store
    }

    #[test]
    fn test_store_creation() {
        let store = StepStore::new(8);
        assert_eq!(store.capacity(), 8);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn set_pitch_extends_pattern() {
        let mut store = StepStore::new(8);
        store.set_pitch(3, 48);
        assert_eq!(store.len(), 4);
        assert_eq!(store.pitch(3), 48);

        store.set_pitch(1, 50);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn set_pitch_ignores_bad_input() {
        let mut store = StepStore::new(4);
        store.set_pitch(4, 48);
        store.set_pitch(0, 128);
        assert_eq!(store.len(), 0);
        assert_eq!(store.pitch(0), DEFAULT_PITCH);
    }

    #[test]
    fn out_of_range_reads_fall_back() {
        let store = StepStore::new(4);
        assert_eq!(store.pitch(99), DEFAULT_PITCH);
        assert_eq!(store.gate(99), DEFAULT_GATE);
        assert!(store.step(4).is_none());
    }

    #[test]
    fn gate_is_clamped() {
        let mut store = StepStore::new(4);
        store.set_gate(0, 1.7);
        store.set_gate(1, -0.3);
        store.set_gate(2, f32::NAN);
        assert_eq!(store.gate(0), 1.0);
        assert_eq!(store.gate(1), 0.0);
        assert_eq!(store.gate(2), DEFAULT_GATE);
    }

    #[test]
    fn set_len_respects_capacity() {
        let mut store = StepStore::new(4);
        store.set_len(3);
        assert_eq!(store.len(), 3);
        store.set_len(5);
        assert_eq!(store.len(), 3);
        store.set_len(0);
        assert!(store.is_empty());
    }

    #[test]
    fn stale_steps_survive_shrink() {
        let mut store = store_with(&[36, 40, 43, 48]);
        store.set_len(2);
        assert!(!store.is_active(3));
        store.set_len(4);
        assert_eq!(store.pitch(3), 48);
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = store_with(&[36, 40]);
        store.set_gate(0, 0.9);
        store.clear();
        assert_eq!(store.len(), 0);
        assert_eq!(store.step(0), Some(Step::default()));
        assert_eq!(store.gate(0), 0.5);
    }

    #[test]
    fn load_truncates_to_capacity() {
        let mut store = StepStore::new(2);
        store.load_pitches(&[36, 40, 43]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.pitch(1), 40);
    }

    #[test]
    fn navigation_wraps() {
        let store = store_with(&[36, 40, 43, 48]);
        assert_eq!(store.next_index(0), 1);
        assert_eq!(store.next_index(3), 0);
        assert_eq!(store.previous_index(0), 3);
        assert_eq!(store.previous_index(3), 2);

        let empty = StepStore::new(4);
        assert_eq!(empty.next_index(2), 0);
        assert_eq!(empty.previous_index(2), 0);
    }

    #[test]
    fn transpose_round_trip() {
        let mut store = store_with(&[36, 40, 43, 48]);
        assert_eq!(store.transpose(5), 5);
        assert_eq!(store.active_steps()[0].pitch, 41);
        assert_eq!(store.transpose(-5), -5);
        let pitches: Vec<u8> = store.active_steps().iter().map(|s| s.pitch).collect();
        assert_eq!(pitches, vec![36, 40, 43, 48]);
    }

    #[test]
    fn transpose_clamps_whole_pattern() {
        let mut store = store_with(&[36, 96]);
        assert_eq!(store.transpose(24), 0);
        assert_eq!(store.pitch(1), 96);

        let mut store = store_with(&[40, 84]);
        assert_eq!(store.transpose(24), 12);
        assert_eq!(store.pitch(0), 52);
        assert_eq!(store.pitch(1), 96);

        assert_eq!(store.transpose(-40), -16);
        assert_eq!(store.pitch(0), 36);
        assert_eq!(store.pitch(1), 80);
    }

    #[test]
    fn transpose_skips_unwritten_steps() {
        let mut store = StepStore::new(4);
        store.set_pitch(2, 60);
        assert_eq!(store.transpose(3), 3);
        assert_eq!(store.pitch(0), DEFAULT_PITCH);
        assert_eq!(store.pitch(2), 63);
    }

    #[test]
    fn transpose_empty_is_noop() {
        let mut store = StepStore::new(4);
        assert_eq!(store.transpose(7), 0);
        store.set_len(4);
        assert_eq!(store.transpose(7), 0);
    }

    #[test]
    fn transpose_leaves_inactive_steps() {
        let mut store = store_with(&[48, 50, 52]);
        store.set_len(2);
        store.transpose(2);
        assert_eq!(store.pitch(2), 52);
    }
}
