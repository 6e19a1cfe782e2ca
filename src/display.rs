/// Read-only views of the sequencer for displays and telemetry
use crate::midi::midi_note_name;
use crate::sequencer::playback::{PlaybackController, PlaybackMode};
use crate::sequencer::scale::Scale;

/// How long the BPM and scale read-outs stay up after a change, in seconds
pub const OVERLAY_SECONDS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: PlaybackMode,
    pub current_step: usize,
    pub pitch: u8,
    pub gate: f32,
    pub active_len: usize,
    pub capacity: usize,
    pub bpm: f32,
    pub scale: Scale,
    pub transpose: i32,
    /// (pitch, gate) of every active step
    pub steps: Vec<(u8, f32)>,
    pub overlay: Option<Overlay>,
}

impl Snapshot {
    pub fn capture(
        controller: &PlaybackController,
        scale: Scale,
        overlay: Option<Overlay>,
    ) -> Self {
        let pattern = controller.pattern();
        Self {
            mode: controller.mode(),
            current_step: controller.current_step(),
            pitch: controller.current_pitch(),
            gate: controller.current_gate(),
            active_len: pattern.len(),
            capacity: pattern.capacity(),
            bpm: controller.bpm(),
            scale,
            transpose: controller.transpose_offset(),
            steps: pattern.active_steps().iter().map(|s| (s.pitch, s.gate)).collect(),
            overlay,
        }
    }

    /// "3/16" style position, 1-based
    pub fn position_label(&self) -> String {
        if self.active_len == 0 {
            return "0/0".to_string();
        }
        format!("{}/{}", self.current_step + 1, self.active_len)
    }

    pub fn note_label(&self) -> String {
        midi_note_name(self.pitch)
    }

    /// Lowest and highest pitch in the active pattern, for scaling a plot
    pub fn pitch_span(&self) -> Option<(u8, u8)> {
        let lowest = self.steps.iter().map(|s| s.0).min()?;
        let highest = self.steps.iter().map(|s| s.0).max()?;
        Some((lowest, highest))
    }
}

/// Consumer of snapshots; never writes back into the sequencer.
pub trait DisplaySink {
    fn show(&mut self, snapshot: &Snapshot);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Bpm(f32),
    Scale(Scale),
}

impl Overlay {
    pub fn label(&self) -> String {
        match self {
            Overlay::Bpm(bpm) => format!("BPM: {:.1}", bpm),
            Overlay::Scale(scale) => format!("Scale: {}", scale.short_name()),
        }
    }
}

/// Decides which transient read-out, if any, the display shows.
#[derive(Debug, Clone, Default)]
pub struct DisplayOverlay {
    clock: f32,
    bpm_changed_at: Option<f32>,
    scale_changed_at: Option<f32>,
    last_scale: Option<Scale>,
}

impl DisplayOverlay {
    pub fn update(&mut self, delta_seconds: f32) {
        self.clock += delta_seconds.max(0.0);
    }

    pub fn notify_bpm_changed(&mut self) {
        self.bpm_changed_at = Some(self.clock);
    }

    /// The first scale seen is the baseline and does not pop up.
    pub fn notify_scale(&mut self, scale: Scale) {
        match self.last_scale {
            Some(last) if last != scale => self.scale_changed_at = Some(self.clock),
            _ => {}
        }
        self.last_scale = Some(scale);
    }

    fn recent(&self, at: Option<f32>) -> bool {
        at.map_or(false, |at| self.clock - at <= OVERLAY_SECONDS)
    }

    /// BPM wins when both changed recently.
    pub fn current(&self, bpm: f32) -> Option<Overlay> {
        if self.recent(self.bpm_changed_at) {
            return Some(Overlay::Bpm(bpm));
        }
        if self.recent(self.scale_changed_at) {
            return self.last_scale.map(Overlay::Scale);
        }
        None
    }
}
