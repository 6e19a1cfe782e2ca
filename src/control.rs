/// Control surface handling - the same knobs and buttons mean different
/// things while playing and while editing.
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::sequencer::clock::{MAX_BPM, MIN_BPM};
use crate::sequencer::playback::PlaybackController;
use crate::sequencer::scale::Scale;
use crate::voltage::BASE_PITCH;

/// Knob readings are compared at this resolution (a 10-bit ADC)
pub const KNOB_RESOLUTION: f32 = 1023.0;

/// One sample of the front panel. Buttons are debounced levels, knobs are
/// smoothed and normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlFrame {
    pub play: bool,
    pub left: bool,
    pub right: bool,
    /// Tempo while playing, gate length while editing
    pub tempo: f32,
    /// Transpose while playing, step pitch while editing
    pub pitch: f32,
    /// Scale for randomize, octave span while editing
    pub selector: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    pub fn update(&mut self, level: bool) -> Option<Edge> {
        let edge = match (self.last, level) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        };
        self.last = level;
        edge
    }
}

/// Reports a knob as changed only once it has moved at least `threshold`
/// steps from the last reported position. The first reading only sets the
/// baseline.
#[derive(Debug, Clone, Copy)]
pub struct ChangeGate {
    threshold: u16,
    last: Option<u16>,
}

impl ChangeGate {
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold: threshold.max(1),
            last: None,
        }
    }

    pub fn changed(&mut self, raw: u16) -> bool {
        match self.last {
            None => {
                self.last = Some(raw);
                false
            }
            Some(last) if last.abs_diff(raw) >= self.threshold => {
                self.last = Some(raw);
                true
            }
            Some(_) => false,
        }
    }
}

pub fn quantize(value: f32) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * KNOB_RESOLUTION).round() as u16
}

fn normalized(raw: u16) -> f32 {
    f32::from(raw) / KNOB_RESOLUTION
}

pub fn linear(value: f32, min: f32, max: f32) -> f32 {
    min + value * (max - min)
}

/// Knob response with a power-law taper
pub fn curved(value: f32, min: f32, max: f32, curve: f32) -> f32 {
    min + value.powf(curve) * (max - min)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSettings {
    pub bpm_min: f32,
    pub bpm_max: f32,
    pub bpm_curve: f32,
    pub tempo_threshold: u16,
    pub pitch_threshold: u16,
    pub transpose_range: i32,
    pub root: u8,
    pub octaves: u8,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            bpm_min: 60.0,
            bpm_max: MAX_BPM,
            bpm_curve: 2.0,
            tempo_threshold: 10,
            pitch_threshold: 5,
            transpose_range: 12,
            root: BASE_PITCH,
            octaves: 3,
        }
    }
}

/// What a control update did, for display and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlResponse {
    pub toggled: bool,
    pub randomized: bool,
    pub bpm_changed: bool,
    pub edited: bool,
}

pub struct ModeCoordinator {
    settings: ControlSettings,
    play: EdgeDetector,
    left: EdgeDetector,
    right: EdgeDetector,
    tempo_gate: ChangeGate,
    pitch_gate: ChangeGate,
    transpose_target: i32,
    combo_latched: bool,
    selector: f32,
    rng: SmallRng,
}

impl ModeCoordinator {
    pub fn new(settings: ControlSettings) -> Self {
        Self::with_rng(settings, SmallRng::from_entropy())
    }

    pub fn with_rng(settings: ControlSettings, rng: SmallRng) -> Self {
        Self {
            play: EdgeDetector::default(),
            left: EdgeDetector::default(),
            right: EdgeDetector::default(),
            tempo_gate: ChangeGate::new(settings.tempo_threshold),
            pitch_gate: ChangeGate::new(settings.pitch_threshold),
            transpose_target: 0,
            combo_latched: false,
            selector: 0.0,
            settings,
            rng,
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn transpose_target(&self) -> i32 {
        self.transpose_target
    }

    /// Scale currently picked by the selector knob
    pub fn scale(&self) -> Scale {
        scale_for(self.selector)
    }

    pub fn update(
        &mut self,
        frame: &ControlFrame,
        controller: &mut PlaybackController,
    ) -> ControlResponse {
        let mut response = ControlResponse::default();
        self.selector = frame.selector.clamp(0.0, 1.0);

        if self.play.update(frame.play) == Some(Edge::Rising) {
            controller.toggle_play();
            self.transpose_target = 0;
            response.toggled = true;
        }

        let left_edge = self.left.update(frame.left);
        let right_edge = self.right.update(frame.right);

        if frame.left && frame.right && !self.combo_latched {
            let scale = self.scale();
            let ControlSettings { root, octaves, .. } = self.settings;
            controller.randomize(&mut self.rng, root, octaves, scale.id());
            self.combo_latched = true;
            response.randomized = true;
        }

        // Releases that end a two-button gesture are not navigation.
        let navigate_left = !self.combo_latched && left_edge == Some(Edge::Falling);
        let navigate_right = !self.combo_latched && right_edge == Some(Edge::Falling);
        if !frame.left && !frame.right {
            self.combo_latched = false;
        }

        if controller.is_playing() {
            self.play_mode(frame, controller, navigate_left, navigate_right, &mut response);
        } else {
            self.edit_mode(frame, controller, navigate_left, navigate_right, &mut response);
        }
        response
    }

    fn play_mode(
        &mut self,
        frame: &ControlFrame,
        controller: &mut PlaybackController,
        left: bool,
        right: bool,
        response: &mut ControlResponse,
    ) {
        let tempo = quantize(frame.tempo);
        if self.tempo_gate.changed(tempo) {
            let settings = &self.settings;
            let bpm = curved(
                normalized(tempo),
                settings.bpm_min,
                settings.bpm_max,
                settings.bpm_curve,
            );
            let before = controller.bpm();
            controller.set_bpm(bpm.clamp(MIN_BPM, MAX_BPM));
            response.bpm_changed = controller.bpm() != before;
        }

        let pitch = quantize(frame.pitch);
        if self.pitch_gate.changed(pitch) {
            let range = self.settings.transpose_range as f32;
            let target = linear(normalized(pitch), -range, range).round() as i32;
            let delta = target - self.transpose_target;
            if delta != 0 {
                // follow the applied shift so a clamped turn is undone from where
                // the pattern actually sits
                self.transpose_target += controller.transpose(delta);
            }
        }

        let len = controller.pattern().len();
        if left && len > 1 {
            controller.set_active_length(len - 1);
        }
        let len = controller.pattern().len();
        if right && len < controller.pattern().capacity() {
            controller.set_active_length(len + 1);
        }
    }

    fn edit_mode(
        &mut self,
        frame: &ControlFrame,
        controller: &mut PlaybackController,
        left: bool,
        right: bool,
        response: &mut ControlResponse,
    ) {
        let step = controller.current_step();

        let pitch = quantize(frame.pitch);
        if self.pitch_gate.changed(pitch) {
            let span = linear(self.selector, 1.0, 5.0);
            let range = (span * 12.0) as u8;
            let low = f32::from(self.settings.root);
            let high = low + f32::from(range);
            let note = linear(normalized(pitch), low, high).round().min(127.0) as u8;
            controller.set_pitch(step, note);
            response.edited = true;
        }

        let gate = quantize(frame.tempo);
        if self.tempo_gate.changed(gate) {
            controller.set_gate(step, linear(normalized(gate), 0.1, 1.0));
            response.edited = true;
        }

        if left {
            controller.step_backward();
        }
        if right {
            controller.step_forward();
        }
    }
}

pub fn scale_for(selector: f32) -> Scale {
    let selector = if selector.is_nan() {
        0.0
    } else {
        selector.clamp(0.0, 1.0)
    };
    Scale::from_id(linear(selector, 0.0, 9.99) as usize)
}
