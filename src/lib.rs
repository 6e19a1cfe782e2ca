/// STEPCV - a control-voltage step sequencer core
///
/// This library provides the pieces of a hardware CV sequencer:
/// - Step storage, tempo clock, scales and the play/stop state machine
/// - Front-panel handling where knobs change meaning between play and edit
/// - Pitch to voltage mapping (1V/octave)
/// - Output sinks: CV/gate model, MIDI output and an audio preview
/// - A driver that ties it together one tick at a time

pub mod audio;
pub mod config;
pub mod control;
pub mod display;
pub mod driver;
pub mod midi;
pub mod output;
pub mod sequencer;
pub mod voltage;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use config::Config;
pub use control::{ControlFrame, ModeCoordinator};
pub use display::{DisplaySink, Snapshot};
pub use driver::{Instrument, Tick};
pub use midi::{midi_note_name, MidiOutputDevice};
pub use output::{CvGateOutput, OutputError, StepSink};
pub use sequencer::clock::TempoClock;
pub use sequencer::playback::{PlaybackController, PlaybackMode, StepEvent};
pub use sequencer::scale::Scale;
pub use sequencer::{Step, StepStore};
pub use voltage::{pitch_to_normalized_level, VoltageMapper};
