/// Playback controller - coordinates timing and the current step
use rand::Rng;

use super::clock::TempoClock;
use super::scale;
use super::{StepStore, DEFAULT_GATE};
use crate::voltage::BASE_PITCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    Stopped,
    Playing,
}

/// Emitted when a step's time window closes.
///
/// Carries everything an output driver needs to schedule a gate pulse of
/// `gate * step_duration` seconds at `pitch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub step_index: usize,
    pub pitch: u8,
    pub gate: f32,
    pub step_duration: f32,
}

impl StepEvent {
    /// How long the gate stays high, in seconds
    pub fn gate_seconds(&self) -> f32 {
        self.gate * self.step_duration
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    pattern: StepStore,
    clock: TempoClock,
    mode: PlaybackMode,
    current_step: usize,
    transpose_offset: i32,
    // pitches from before the first live transpose, put back by `stop`
    live_origin: Option<Box<[u8]>>,
    root_pitch: u8,
}

impl PlaybackController {
    pub fn new(pattern: StepStore, clock: TempoClock) -> Self {
        Self {
            pattern,
            clock,
            mode: PlaybackMode::Stopped,
            current_step: 0,
            transpose_offset: 0,
            live_origin: None,
            root_pitch: BASE_PITCH,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(StepStore::new(capacity), TempoClock::default())
    }

    pub fn pattern(&self) -> &StepStore {
        &self.pattern
    }

    /// Pitches written through here during a live transpose are undone by `stop`.
    pub fn pattern_mut(&mut self) -> &mut StepStore {
        &mut self.pattern
    }

    pub fn clock(&self) -> &TempoClock {
        &self.clock
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn is_playing(&self) -> bool {
        self.mode == PlaybackMode::Playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn transpose_offset(&self) -> i32 {
        self.transpose_offset
    }

    /// Pitch played when the pattern is empty
    pub fn root_pitch(&self) -> u8 {
        self.root_pitch
    }

    pub fn set_root_pitch(&mut self, pitch: u8) {
        if pitch <= super::MAX_PITCH {
            self.root_pitch = pitch;
        }
    }

    pub fn bpm(&self) -> f32 {
        self.clock.bpm()
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.clock.set_bpm(bpm);
    }

    /// Pitch at the current step, or the root pitch if the pattern is empty
    pub fn current_pitch(&self) -> u8 {
        if self.pattern.is_active(self.current_step) {
            self.pattern.pitch(self.current_step)
        } else {
            self.root_pitch
        }
    }

    pub fn current_gate(&self) -> f32 {
        if self.pattern.is_active(self.current_step) {
            self.pattern.gate(self.current_step)
        } else {
            DEFAULT_GATE
        }
    }

    pub fn start(&mut self) {
        if self.is_playing() {
            return;
        }
        self.mode = PlaybackMode::Playing;
        self.clock.start();
        log::info!("playback started at {:.1} bpm", self.clock.bpm());
    }

    /// Stopping undoes any live transpose so the stored pattern is unchanged,
    /// including steps that left or joined the active range meanwhile.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.mode = PlaybackMode::Stopped;
        self.clock.stop();

        if let Some(origin) = self.live_origin.take() {
            self.pattern.restore_pitches(&origin);
            log::debug!("transpose {} undone", self.transpose_offset);
        }
        self.transpose_offset = 0;
        log::info!("playback stopped at step {}", self.current_step);
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Feed elapsed time. Returns the event for the step whose window just
    /// closed, after which the controller moves on to the next step.
    pub fn advance(&mut self, delta_seconds: f32) -> Option<StepEvent> {
        if !self.is_playing() || !self.clock.tick(delta_seconds) {
            return None;
        }

        if !self.pattern.is_active(self.current_step) {
            self.current_step = 0;
        }

        let event = StepEvent {
            step_index: self.current_step,
            pitch: self.current_pitch(),
            gate: self.current_gate(),
            step_duration: self.clock.step_interval(),
        };
        self.current_step = self.pattern.next_index(self.current_step);

        log::trace!("step {} pitch {} gate {:.2}", event.step_index, event.pitch, event.gate);
        Some(event)
    }

    /// Jump to `step`; ignored unless it is inside the active pattern.
    pub fn go_to_step(&mut self, step: usize) -> bool {
        if !self.pattern.is_active(step) {
            return false;
        }
        self.current_step = step;
        true
    }

    pub fn step_forward(&mut self) {
        self.current_step = self.pattern.next_index(self.current_step);
    }

    pub fn step_backward(&mut self) {
        self.current_step = self.pattern.previous_index(self.current_step);
    }

    /// Change the active length, moving back to step 0 if the current step
    /// falls off the end.
    pub fn set_active_length(&mut self, len: usize) {
        self.pattern.set_len(len);
        if !self.pattern.is_active(self.current_step) {
            self.current_step = 0;
        }
        log::debug!("active length {}", self.pattern.len());
    }

    /// Transpose the pattern. While playing the applied shift is remembered
    /// so `stop` can revert it; while stopped it is a permanent edit.
    pub fn transpose(&mut self, semitones: i32) -> i32 {
        if self.is_playing() && self.live_origin.is_none() {
            self.live_origin = Some(self.pattern.pitches());
        }
        let applied = self.pattern.transpose(semitones);
        if self.is_playing() {
            self.transpose_offset += applied;
        }
        if applied != 0 {
            log::debug!("transpose {} (requested {})", applied, semitones);
        }
        applied
    }

    pub fn randomize<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        root: u8,
        octaves: u8,
        scale_id: usize,
    ) {
        scale::randomize(&mut self.pattern, rng, root, octaves, scale_id);
        // Randomized pitches are the new baseline; nothing left to revert.
        self.transpose_offset = 0;
        self.live_origin = None;
    }

    /// An explicit pitch edit is kept when a live transpose is undone.
    pub fn set_pitch(&mut self, index: usize, pitch: u8) {
        self.pattern.set_pitch(index, pitch);
        if let Some(origin) = self.live_origin.as_mut() {
            if let Some(slot) = origin.get_mut(index) {
                *slot = self.pattern.pitch(index);
            }
        }
    }

    pub fn set_gate(&mut self, index: usize, gate: f32) {
        self.pattern.set_gate(index, gate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::presets::Preset;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn playing(pitches: &[u8]) -> PlaybackController {
        let mut controller = PlaybackController::with_capacity(16);
        controller.pattern_mut().load_pitches(pitches);
        controller.start();
        controller
    }

    #[test]
    fn starts_stopped_at_step_zero() {
        let controller = PlaybackController::with_capacity(8);
        assert_eq!(controller.mode(), PlaybackMode::Stopped);
        assert_eq!(controller.current_step(), 0);
        assert_eq!(controller.current_pitch(), BASE_PITCH);
    }

    #[test]
    fn stopped_controller_does_not_advance() {
        let mut controller = PlaybackController::with_capacity(8);
        controller.pattern_mut().load_pitches(&[36, 40]);
        assert!(controller.advance(10.0).is_none());
        assert_eq!(controller.current_step(), 0);
    }

    #[test]
    fn event_describes_finished_step() {
        let mut controller = playing(&[36, 40, 43, 48]);
        controller.set_gate(0, 0.25);

        let event = controller.advance(0.5).expect("boundary crossed");
        assert_eq!(event.step_index, 0);
        assert_eq!(event.pitch, 36);
        assert_eq!(event.gate, 0.25);
        assert_eq!(event.step_duration, 0.5);
        assert_eq!(event.gate_seconds(), 0.125);
        assert_eq!(controller.current_step(), 1);
    }

    #[test]
    fn advance_wraps() {
        let mut controller = playing(&[36, 40, 43, 48]);
        assert!(controller.go_to_step(3));
        let event = controller.advance(0.5).expect("boundary crossed");
        assert_eq!(event.step_index, 3);
        assert_eq!(controller.current_step(), 0);
    }

    #[test]
    fn empty_pattern_plays_root() {
        let mut controller = playing(&[]);
        let event = controller.advance(0.5).expect("boundary crossed");
        assert_eq!(event.step_index, 0);
        assert_eq!(event.pitch, BASE_PITCH);
        assert_eq!(event.gate, DEFAULT_GATE);
        assert_eq!(controller.current_step(), 0);
    }

    #[test]
    fn start_keeps_position() {
        let mut controller = playing(&[36, 40, 43]);
        controller.advance(0.5);
        controller.stop();
        controller.start();
        assert_eq!(controller.current_step(), 1);
    }

    #[test]
    fn go_to_step_rejects_inactive() {
        let mut controller = PlaybackController::with_capacity(8);
        controller.pattern_mut().load_pitches(&[36, 40, 43]);
        assert!(controller.go_to_step(2));
        assert!(!controller.go_to_step(3));
        assert!(!controller.go_to_step(7));
        assert_eq!(controller.current_step(), 2);
    }

    #[test]
    fn step_navigation_wraps() {
        let mut controller = PlaybackController::with_capacity(8);
        controller.pattern_mut().load_pitches(&[36, 40, 43]);
        controller.step_backward();
        assert_eq!(controller.current_step(), 2);
        controller.step_forward();
        assert_eq!(controller.current_step(), 0);
    }

    #[test]
    fn shrinking_past_current_step_returns_to_start() {
        let mut controller = playing(&[36, 40, 43, 48]);
        controller.go_to_step(3);
        controller.set_active_length(2);
        assert_eq!(controller.current_step(), 0);

        controller.go_to_step(1);
        controller.set_active_length(3);
        assert_eq!(controller.current_step(), 1);
    }

    #[test]
    fn stop_reverts_live_transpose() {
        let mut controller = playing(&[48, 52, 55]);
        assert_eq!(controller.transpose(5), 5);
        assert_eq!(controller.transpose(-2), -2);
        assert_eq!(controller.transpose_offset(), 3);
        assert_eq!(controller.pattern().pitch(0), 51);

        controller.stop();
        assert_eq!(controller.transpose_offset(), 0);
        assert_eq!(controller.pattern().pitch(0), 48);
        assert_eq!(controller.pattern().pitch(2), 55);
    }

    #[test]
    fn stop_reverts_clamped_transpose_exactly() {
        let mut controller = playing(&[60, 90]);
        assert_eq!(controller.transpose(12), 6);
        controller.stop();
        assert_eq!(controller.pattern().pitch(0), 60);
        assert_eq!(controller.pattern().pitch(1), 90);
    }

    #[test]
    fn stop_restores_pattern_reaching_below_floor() {
        let mut controller = PlaybackController::with_capacity(8);
        Preset::AMinorArpeggio.load_into(controller.pattern_mut());
        let before = controller.pattern().pitches();

        controller.start();
        assert_eq!(controller.transpose(6), 6);
        assert_eq!(controller.pattern().pitch(0), 39);
        controller.stop();

        assert_eq!(controller.pattern().pitches(), before);
    }

    #[test]
    fn stop_restores_steps_outside_active_range() {
        let mut controller = playing(&[48, 50, 52, 55]);
        controller.transpose(5);
        controller.set_active_length(3);
        controller.transpose(2);
        controller.set_active_length(4);
        controller.stop();

        let restored: Vec<u8> = controller.pattern().pitches()[..4].to_vec();
        assert_eq!(restored, vec![48, 50, 52, 55]);
    }

    #[test]
    fn pitch_edit_survives_live_transpose_undo() {
        let mut controller = playing(&[48, 50]);
        controller.transpose(3);
        controller.set_pitch(1, 60);
        controller.stop();
        assert_eq!(controller.pattern().pitch(0), 48);
        assert_eq!(controller.pattern().pitch(1), 60);
    }

    #[test]
    fn transpose_while_stopped_is_permanent() {
        let mut controller = PlaybackController::with_capacity(4);
        controller.pattern_mut().load_pitches(&[48]);
        controller.transpose(2);
        assert_eq!(controller.transpose_offset(), 0);
        controller.start();
        controller.stop();
        assert_eq!(controller.pattern().pitch(0), 50);
    }

    #[test]
    fn randomize_resets_offset() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut controller = playing(&[48, 50, 52, 53]);
        controller.transpose(4);
        controller.randomize(&mut rng, 36, 3, 0);
        assert_eq!(controller.transpose_offset(), 0);
        assert_eq!(controller.pattern().len(), 4);

        let randomized = controller.pattern().pitches();
        controller.stop();
        assert_eq!(controller.pattern().pitches(), randomized);
    }
}
