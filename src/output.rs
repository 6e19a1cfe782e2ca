/// Output side of the instrument - everything that consumes step events
use std::fmt;

use crate::sequencer::playback::StepEvent;
use crate::voltage::VoltageMapper;

/// Beat lamp stays lit for this fraction of a step
pub const BEAT_BLINK_DIVISOR: f32 = 8.0;

/// Downbeat lamp stays lit for this fraction of a step
pub const DOWNBEAT_BLINK_DIVISOR: f32 = 4.0;

/// Error types reported by output devices
#[derive(Debug, Clone)]
pub enum OutputError {
    /// Could not open the host API or device
    DeviceInit { message: String },

    /// No output port with this index or name
    PortNotFound { port: String },

    /// Port exists but the connection was refused
    ConnectFailed { port: String, message: String },

    /// A message could not be delivered
    SendFailed { message: String },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::DeviceInit { message } => {
                write!(f, "Failed to open output device: {}", message)
            }
            OutputError::PortNotFound { port } => write!(f, "Output port not found: {}", port),
            OutputError::ConnectFailed { port, message } => {
                write!(f, "Failed to connect to {}: {}", port, message)
            }
            OutputError::SendFailed { message } => write!(f, "Failed to send: {}", message),
        }
    }
}

impl std::error::Error for OutputError {}

/// Anything that turns step events into sound, voltage or light.
///
/// `handle_step` is called once per step event; `update` is called every
/// driver tick so sinks can close gates on time.
pub trait StepSink {
    fn handle_step(&mut self, event: &StepEvent) -> Result<(), OutputError>;

    fn update(&mut self, _delta_seconds: f32) -> Result<(), OutputError> {
        Ok(())
    }

    /// Close any open gate immediately (transport stopped)
    fn silence(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// A timed pulse: high for a duration, then low.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GateTimer {
    remaining: f32,
    high: bool,
}

impl GateTimer {
    pub fn trigger(&mut self, seconds: f32) {
        if seconds.is_finite() && seconds > 0.0 {
            self.remaining = seconds;
            self.high = true;
        } else {
            self.close();
        }
    }

    pub fn close(&mut self) {
        self.remaining = 0.0;
        self.high = false;
    }

    /// Count down; returns true on the update that closes the gate.
    pub fn update(&mut self, delta_seconds: f32) -> bool {
        if !self.high {
            return false;
        }
        self.remaining -= delta_seconds.max(0.0);
        if self.remaining <= 0.0 {
            self.close();
            return true;
        }
        false
    }

    pub fn is_high(&self) -> bool {
        self.high
    }
}

/// Model of the pitch CV and gate jacks.
///
/// Holds the level a PWM/DAC stage should output and whether the gate jack
/// is high. Hardware shims read `level()` and `gate_high()` each tick.
#[derive(Debug, Clone, Default)]
pub struct CvGateOutput {
    mapper: VoltageMapper,
    pitch: Option<u8>,
    gate: GateTimer,
}

impl CvGateOutput {
    pub fn new(mapper: VoltageMapper) -> Self {
        Self {
            mapper,
            pitch: None,
            gate: GateTimer::default(),
        }
    }

    pub fn mapper(&self) -> &VoltageMapper {
        &self.mapper
    }

    pub fn pitch(&self) -> Option<u8> {
        self.pitch
    }

    pub fn volts(&self) -> f32 {
        self.pitch.map(|p| self.mapper.volts(p)).unwrap_or(0.0)
    }

    /// Duty cycle for the pitch output
    pub fn level(&self) -> f32 {
        self.pitch.map(|p| self.mapper.duty(p)).unwrap_or(0.0)
    }

    pub fn gate_high(&self) -> bool {
        self.gate.is_high()
    }
}

impl StepSink for CvGateOutput {
    fn handle_step(&mut self, event: &StepEvent) -> Result<(), OutputError> {
        self.pitch = Some(event.pitch);
        self.gate.trigger(event.gate_seconds());
        Ok(())
    }

    fn update(&mut self, delta_seconds: f32) -> Result<(), OutputError> {
        self.gate.update(delta_seconds);
        Ok(())
    }

    fn silence(&mut self) -> Result<(), OutputError> {
        self.gate.close();
        Ok(())
    }
}

/// Beat and downbeat lamps
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatIndicator {
    beat: GateTimer,
    downbeat: GateTimer,
}

impl BeatIndicator {
    pub fn beat_lit(&self) -> bool {
        self.beat.is_high()
    }

    pub fn downbeat_lit(&self) -> bool {
        self.downbeat.is_high()
    }

    pub fn flash(&mut self, event: &StepEvent) {
        self.beat.trigger(event.step_duration / BEAT_BLINK_DIVISOR);
        if event.step_index == 0 {
            self.downbeat.trigger(event.step_duration / DOWNBEAT_BLINK_DIVISOR);
        }
    }

    pub fn update(&mut self, delta_seconds: f32) {
        self.beat.update(delta_seconds);
        self.downbeat.update(delta_seconds);
    }

    pub fn off(&mut self) {
        self.beat.close();
        self.downbeat.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(step_index: usize, pitch: u8, gate: f32) -> StepEvent {
        StepEvent {
            step_index,
            pitch,
            gate,
            step_duration: 0.5,
        }
    }

    #[test]
    fn gate_timer_closes_after_duration() {
        let mut gate = GateTimer::default();
        gate.trigger(0.25);
        assert!(gate.is_high());
        assert!(!gate.update(0.125));
        assert!(gate.is_high());
        assert!(gate.update(0.125));
        assert!(!gate.is_high());
        assert!(!gate.update(0.125));
    }

    #[test]
    fn zero_length_gate_stays_low() {
        let mut gate = GateTimer::default();
        gate.trigger(0.0);
        assert!(!gate.is_high());
        gate.trigger(f32::NAN);
        assert!(!gate.is_high());
    }

    #[test]
    fn cv_output_follows_events() {
        let mut output = CvGateOutput::default();
        assert_eq!(output.level(), 0.0);

        output.handle_step(&event(0, 48, 0.5)).unwrap();
        assert_eq!(output.volts(), 1.0);
        assert!((output.level() - 0.2).abs() < 1e-6);
        assert!(output.gate_high());

        output.update(0.2).unwrap();
        assert!(output.gate_high());
        output.update(0.1).unwrap();
        assert!(!output.gate_high());
        assert_eq!(output.pitch(), Some(48));
    }

    #[test]
    fn silence_closes_gate() {
        let mut output = CvGateOutput::default();
        output.handle_step(&event(0, 60, 1.0)).unwrap();
        output.silence().unwrap();
        assert!(!output.gate_high());
    }

    #[test]
    fn downbeat_lamp_only_on_first_step() {
        let mut lamps = BeatIndicator::default();
        lamps.flash(&event(1, 40, 0.5));
        assert!(lamps.beat_lit());
        assert!(!lamps.downbeat_lit());

        lamps.update(0.0625);
        assert!(!lamps.beat_lit());

        lamps.flash(&event(0, 36, 0.5));
        assert!(lamps.downbeat_lit());
        lamps.update(0.0625);
        assert!(lamps.downbeat_lit());
        lamps.update(0.0625);
        assert!(!lamps.downbeat_lit());

        lamps.flash(&event(0, 36, 0.5));
        lamps.off();
        assert!(!lamps.beat_lit());
        assert!(!lamps.downbeat_lit());
    }

    #[test]
    fn error_messages_name_the_port() {
        let err = OutputError::PortNotFound {
            port: "Volca".to_string(),
        };
        assert_eq!(err.to_string(), "Output port not found: Volca");
    }
}
