/// MIDI output using midir
///
/// Mirrors the CV/gate jacks over MIDI: note-on at each step event, note-off
/// when the step's gate window closes.
use midir::{MidiOutput, MidiOutputConnection};

use crate::output::{GateTimer, OutputError, StepSink};
use crate::sequencer::playback::StepEvent;

const CLIENT_NAME: &str = "stepcv MIDI Output";
const NOTE_VELOCITY: u8 = 100;

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    port_name: Option<String>,
    channel: u8,
    sounding: Option<u8>,
    gate: GateTimer,
}

impl MidiOutputDevice {
    /// `channel` is 1-based; out-of-range values fall back to channel 1.
    pub fn new(channel: u8) -> Self {
        Self {
            connection: None,
            port_name: None,
            channel: if (1..=16).contains(&channel) {
                channel - 1
            } else {
                0
            },
            sounding: None,
            gate: GateTimer::default(),
        }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(e) => {
                log::warn!("MIDI unavailable: {}", e);
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), OutputError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| OutputError::DeviceInit {
            message: e.to_string(),
        })?;

        let ports = midi_out.ports();
        let port = ports.get(port_index).ok_or_else(|| OutputError::PortNotFound {
            port: format!("#{}", port_index),
        })?;
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("#{}", port_index));

        let connection = midi_out
            .connect(port, "stepcv")
            .map_err(|e| OutputError::ConnectFailed {
                port: name.clone(),
                message: e.to_string(),
            })?;

        log::info!("MIDI connected to '{}' (channel {})", name, self.channel + 1);
        self.connection = Some(connection);
        self.port_name = Some(name);
        Ok(())
    }

    /// Connect to the first port whose name contains `needle` (case-insensitive)
    pub fn connect_by_name(&mut self, needle: &str) -> Result<(), OutputError> {
        let wanted = needle.to_lowercase();
        let index = Self::available_ports()
            .iter()
            .position(|name| name.to_lowercase().contains(&wanted))
            .ok_or_else(|| OutputError::PortNotFound {
                port: needle.to_string(),
            })?;
        self.connect(index)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), OutputError> {
        self.send(&[0x90 | self.channel, note & 0x7f, velocity & 0x7f])
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), OutputError> {
        self.send(&[0x80 | self.channel, note & 0x7f, 0])
    }

    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message).map_err(|e| OutputError::SendFailed {
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), OutputError> {
        self.gate.close();
        match self.sounding.take() {
            Some(note) => self.send_note_off(note),
            None => Ok(()),
        }
    }

    pub fn disconnect(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("{}", e);
        }
        self.connection = None;
        self.port_name = None;
    }
}

impl StepSink for MidiOutputDevice {
    fn handle_step(&mut self, event: &StepEvent) -> Result<(), OutputError> {
        self.release()?;
        let seconds = event.gate_seconds();
        if seconds <= 0.0 {
            return Ok(());
        }
        self.send_note_on(event.pitch, NOTE_VELOCITY)?;
        self.sounding = Some(event.pitch);
        self.gate.trigger(seconds);
        Ok(())
    }

    fn update(&mut self, delta_seconds: f32) -> Result<(), OutputError> {
        if self.gate.update(delta_seconds) {
            self.release()?;
        }
        Ok(())
    }

    fn silence(&mut self) -> Result<(), OutputError> {
        self.release()
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new(1)
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_names() {
        assert_eq!(midi_note_name(36), "C2");
        assert_eq!(midi_note_name(61), "C#4");
        assert_eq!(midi_note_name(0), "C-1");
        assert_eq!(midi_note_name(127), "G9");
    }

    #[test]
    fn unconnected_device_tracks_gate() {
        let mut device = MidiOutputDevice::new(3);
        let event = StepEvent {
            step_index: 0,
            pitch: 48,
            gate: 0.5,
            step_duration: 0.5,
        };
        device.handle_step(&event).unwrap();
        assert_eq!(device.sounding, Some(48));
        device.update(0.3).unwrap();
        assert_eq!(device.sounding, None);
    }

    #[test]
    fn channel_is_clamped() {
        assert_eq!(MidiOutputDevice::new(16).channel, 15);
        assert_eq!(MidiOutputDevice::new(0).channel, 0);
        assert_eq!(MidiOutputDevice::new(17).channel, 0);
    }
}
