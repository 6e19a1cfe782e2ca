/// Audio preview of the pitch CV using cpal
///
/// Plays a sine at the step's pitch for as long as the gate is high, so a
/// pattern can be auditioned without a modular system attached.
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::output::{GateTimer, OutputError, StepSink};
use crate::sequencer::playback::StepEvent;

const PREVIEW_AMPLITUDE: f32 = 0.2;

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    trigger: Arc<Mutex<Option<f32>>>,
    gate: GateTimer,
}

impl AudioOutput {
    pub fn new() -> Result<Self, OutputError> {
        let trigger = Arc::new(Mutex::new(None));
        let stream = Self::setup_audio_stream(Arc::clone(&trigger))?;

        Ok(Self {
            _stream: Some(stream),
            trigger,
            gate: GateTimer::default(),
        })
    }

    /// An output with no device behind it; triggers are tracked but silent.
    pub fn disabled() -> Self {
        Self {
            _stream: None,
            trigger: Arc::new(Mutex::new(None)),
            gate: GateTimer::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self._stream.is_some()
    }

    fn setup_audio_stream(trigger: Arc<Mutex<Option<f32>>>) -> Result<cpal::Stream, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| OutputError::DeviceInit {
            message: "no default output device".to_string(),
        })?;
        let config = device.default_output_config().map_err(|e| OutputError::DeviceInit {
            message: e.to_string(),
        })?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(OutputError::DeviceInit {
                message: format!("unsupported sample format {:?}", config.sample_format()),
            });
        }

        let sample_rate = config.sample_rate().0 as f32;
        let channels = usize::from(config.channels()).max(1);
        let mut phase = 0.0_f32;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frequency = *lock(&trigger);

                    for frame in data.chunks_mut(channels) {
                        let value = match frequency {
                            Some(frequency) => {
                                let value = (phase * 2.0 * std::f32::consts::PI).sin()
                                    * PREVIEW_AMPLITUDE;
                                phase += frequency / sample_rate;
                                if phase >= 1.0 {
                                    phase -= 1.0;
                                }
                                value
                            }
                            None => {
                                phase = 0.0;
                                0.0
                            }
                        };
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                |err| log::warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| OutputError::DeviceInit {
                message: e.to_string(),
            })?;

        stream.play().map_err(|e| OutputError::DeviceInit {
            message: e.to_string(),
        })?;
        Ok(stream)
    }

    pub fn trigger_note(&mut self, note: u8) {
        *lock(&self.trigger) = Some(midi_note_to_frequency(note));
    }

    pub fn stop_note(&mut self) {
        *lock(&self.trigger) = None;
    }

    pub fn is_sounding(&self) -> bool {
        lock(&self.trigger).is_some()
    }
}

impl StepSink for AudioOutput {
    fn handle_step(&mut self, event: &StepEvent) -> Result<(), OutputError> {
        self.gate.trigger(event.gate_seconds());
        if self.gate.is_high() {
            self.trigger_note(event.pitch);
        } else {
            self.stop_note();
        }
        Ok(())
    }

    fn update(&mut self, delta_seconds: f32) -> Result<(), OutputError> {
        if self.gate.update(delta_seconds) {
            self.stop_note();
        }
        Ok(())
    }

    fn silence(&mut self) -> Result<(), OutputError> {
        self.gate.close();
        self.stop_note();
        Ok(())
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            log::warn!("audio preview disabled: {}", e);
            Self::disabled()
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
