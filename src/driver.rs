/// Driver loop glue: one `tick` per scheduling quantum reads the controls,
/// advances playback and hands out display snapshots on their own cadence.
use crate::config::Config;
use crate::control::{ControlFrame, ControlResponse, ModeCoordinator};
use crate::display::{DisplayOverlay, Snapshot};
use crate::output::{BeatIndicator, StepSink};
use crate::sequencer::clock::TempoClock;
use crate::sequencer::playback::{PlaybackController, StepEvent};
use crate::sequencer::StepStore;

/// Result of one driver tick
#[derive(Debug, Clone, Default)]
pub struct Tick {
    pub event: Option<StepEvent>,
    pub snapshot: Option<Snapshot>,
    pub controls: ControlResponse,
    /// Playback went from playing to stopped during this tick
    pub stopped: bool,
}

pub struct Instrument {
    controller: PlaybackController,
    coordinator: ModeCoordinator,
    lamps: BeatIndicator,
    overlay: DisplayOverlay,
    display_interval: f32,
    since_display: f32,
}

impl Instrument {
    pub fn new(
        controller: PlaybackController,
        coordinator: ModeCoordinator,
        display_interval: f32,
    ) -> Self {
        Self {
            controller,
            coordinator,
            lamps: BeatIndicator::default(),
            overlay: DisplayOverlay::default(),
            display_interval: display_interval.max(0.0),
            // first tick always produces a snapshot
            since_display: f32::INFINITY,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut pattern = StepStore::new(config.capacity());
        config.preset().load_into(&mut pattern);

        let settings = config.control_settings();
        let mut controller = PlaybackController::new(pattern, TempoClock::new(config.bpm()));
        controller.set_root_pitch(settings.root);

        Self::new(controller, ModeCoordinator::new(settings), config.display_interval())
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn lamps(&self) -> &BeatIndicator {
        &self.lamps
    }

    pub fn snapshot(&self) -> Snapshot {
        let overlay = self.overlay.current(self.controller.bpm());
        Snapshot::capture(&self.controller, self.coordinator.scale(), overlay)
    }

    pub fn tick(&mut self, delta_seconds: f32, frame: &ControlFrame) -> Tick {
        let delta_seconds = if delta_seconds.is_finite() {
            delta_seconds.max(0.0)
        } else {
            0.0
        };
        let was_playing = self.controller.is_playing();

        let controls = self.coordinator.update(frame, &mut self.controller);
        if controls.bpm_changed {
            self.overlay.notify_bpm_changed();
        }
        self.overlay.notify_scale(self.coordinator.scale());
        self.overlay.update(delta_seconds);

        let event = self.controller.advance(delta_seconds);
        let stopped = was_playing && !self.controller.is_playing();

        self.lamps.update(delta_seconds);
        if let Some(event) = &event {
            self.lamps.flash(event);
        }
        if stopped {
            self.lamps.off();
        }

        self.since_display += delta_seconds;
        let snapshot = if self.since_display >= self.display_interval {
            self.since_display = 0.0;
            Some(self.snapshot())
        } else {
            None
        };

        Tick {
            event,
            snapshot,
            controls,
            stopped,
        }
    }

    /// Forward this tick's output to every sink. Failures are logged, never
    /// propagated: a stuck MIDI port must not stall the sequencer.
    pub fn dispatch(tick: &Tick, delta_seconds: f32, sinks: &mut [&mut dyn StepSink]) {
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.update(delta_seconds) {
                log::warn!("output update failed: {}", e);
            }
            if tick.stopped {
                if let Err(e) = sink.silence() {
                    log::warn!("output silence failed: {}", e);
                }
            }
            if let Some(event) = &tick.event {
                if let Err(e) = sink.handle_step(event) {
                    log::warn!("output step {} failed: {}", event.step_index, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlSettings;
    use crate::output::{CvGateOutput, OutputError};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn instrument(pitches: &[u8]) -> Instrument {
        let mut controller = PlaybackController::with_capacity(16);
        controller.pattern_mut().load_pitches(pitches);
        let coordinator =
            ModeCoordinator::with_rng(ControlSettings::default(), SmallRng::seed_from_u64(9));
        Instrument::new(controller, coordinator, 0.1)
    }

    struct FailingSink {
        attempts: usize,
    }

    impl StepSink for FailingSink {
        fn handle_step(&mut self, _event: &StepEvent) -> Result<(), OutputError> {
            self.attempts += 1;
            Err(OutputError::SendFailed {
                message: "unplugged".to_string(),
            })
        }
    }

    #[test]
    fn snapshots_follow_display_cadence() {
        let mut instrument = instrument(&[36, 40]);
        let frame = ControlFrame::default();

        assert!(instrument.tick(0.0, &frame).snapshot.is_some());
        assert!(instrument.tick(0.05, &frame).snapshot.is_none());
        assert!(instrument.tick(0.05, &frame).snapshot.is_some());
    }

    #[test]
    fn play_button_starts_and_events_flow() {
        let mut instrument = instrument(&[36, 40]);
        let mut frame = ControlFrame::default();
        frame.play = true;

        let tick = instrument.tick(0.0, &frame);
        assert!(tick.controls.toggled);
        assert!(instrument.controller().is_playing());

        let tick = instrument.tick(0.5, &frame);
        let event = tick.event.expect("step boundary");
        assert_eq!(event.pitch, 36);
        assert!(instrument.lamps().beat_lit());
        assert!(instrument.lamps().downbeat_lit());
    }

    #[test]
    fn stop_is_reported_once() {
        let mut instrument = instrument(&[36]);
        instrument.controller_mut().start();
        let mut frame = ControlFrame::default();
        frame.play = true;

        assert!(instrument.tick(0.01, &frame).stopped);
        assert!(!instrument.tick(0.01, &frame).stopped);
    }

    #[test]
    fn stopping_turns_lamps_off() {
        let mut instrument = instrument(&[36, 40]);
        instrument.controller_mut().start();
        instrument.tick(0.5, &ControlFrame::default());
        assert!(instrument.lamps().downbeat_lit());

        let mut frame = ControlFrame::default();
        frame.play = true;
        assert!(instrument.tick(0.0, &frame).stopped);
        assert!(!instrument.lamps().beat_lit());
        assert!(!instrument.lamps().downbeat_lit());
    }

    #[test]
    fn dispatch_reaches_every_sink_despite_failures() {
        let mut instrument = instrument(&[48]);
        instrument.controller_mut().start();
        let tick = instrument.tick(0.5, &ControlFrame::default());

        let mut failing = FailingSink { attempts: 0 };
        let mut cv = CvGateOutput::default();
        let mut sinks: [&mut dyn StepSink; 2] = [&mut failing, &mut cv];
        Instrument::dispatch(&tick, 0.5, &mut sinks);

        assert_eq!(failing.attempts, 1);
        assert_eq!(cv.pitch(), Some(48));
        assert!(cv.gate_high());
    }

    #[test]
    fn from_config_loads_preset_and_tempo() {
        let config = Config::from_toml_str(
            "[sequencer]\nbpm = 90.0\npreset = \"pentatonic\"\ncapacity = 8",
        );
        let instrument = Instrument::from_config(&config);
        let controller = instrument.controller();
        assert_eq!(controller.bpm(), 90.0);
        assert_eq!(controller.pattern().capacity(), 8);
        assert_eq!(controller.pattern().len(), 8);
        assert!(!controller.is_playing());
    }
}
