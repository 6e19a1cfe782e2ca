#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use std::time::Instant;

#[cfg(feature = "gui")]
use stepcv::{
    AudioOutput, Config, ControlFrame, CvGateOutput, DisplaySink, Instrument, MidiOutputDevice,
    PlaybackMode, Snapshot, StepSink,
};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 560.0])
            .with_title("STEPCV - CV Step Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "STEPCV",
        options,
        Box::new(|_cc| Ok(Box::new(PanelApp::new(Config::load())))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    env_logger::init();
    headless::run(stepcv::Config::load());
}

/// Virtual front panel: three knobs, three buttons, the lamps and the display.
#[cfg(feature = "gui")]
struct PanelApp {
    instrument: Instrument,
    cv: CvGateOutput,
    audio_output: AudioOutput,
    midi_output: MidiOutputDevice,
    frame: ControlFrame,
    screen: PanelScreen,
    last_frame: Instant,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
}

/// Holds whatever the display was last told to show.
#[cfg(feature = "gui")]
#[derive(Default)]
struct PanelScreen {
    snapshot: Option<Snapshot>,
}

#[cfg(feature = "gui")]
impl DisplaySink for PanelScreen {
    fn show(&mut self, snapshot: &Snapshot) {
        self.snapshot = Some(snapshot.clone());
    }
}

#[cfg(feature = "gui")]
impl PanelApp {
    fn new(config: Config) -> Self {
        let instrument = Instrument::from_config(&config);
        let cv = CvGateOutput::new(config.voltage_mapper());

        let audio_output = if config.audio_preview() {
            AudioOutput::default()
        } else {
            AudioOutput::disabled()
        };

        let available_midi_ports = MidiOutputDevice::available_ports();
        let mut midi_output = MidiOutputDevice::new(config.midi_channel());
        let mut selected_port = None;
        if let Some(port) = config.midi_port() {
            match midi_output.connect_by_name(port) {
                Ok(()) => {
                    selected_port = midi_output
                        .port_name()
                        .and_then(|name| available_midi_ports.iter().position(|p| p == name));
                }
                Err(e) => log::warn!("MIDI output unavailable: {}", e),
            }
        }

        let mut screen = PanelScreen::default();
        screen.show(&instrument.snapshot());

        Self {
            instrument,
            cv,
            audio_output,
            midi_output,
            frame: ControlFrame {
                tempo: 0.5,
                pitch: 0.5,
                selector: 0.0,
                ..Default::default()
            },
            screen,
            last_frame: Instant::now(),
            available_midi_ports,
            selected_port,
        }
    }

    fn run_tick(&mut self) {
        let now = Instant::now();
        let delta_seconds = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let tick = self.instrument.tick(delta_seconds, &self.frame);

        let mut sinks: [&mut dyn StepSink; 3] =
            [&mut self.cv, &mut self.audio_output, &mut self.midi_output];
        Instrument::dispatch(&tick, delta_seconds, &mut sinks);

        if let Some(snapshot) = &tick.snapshot {
            self.screen.show(snapshot);
        }
    }

    fn midi_port_selector(&mut self, ui: &mut egui::Ui) {
        let mut selected_port_changed = None;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_label("")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
            }
        });

        if let Some(port_idx) = selected_port_changed {
            match self.midi_output.connect(port_idx) {
                Ok(()) => self.selected_port = Some(port_idx),
                Err(e) => log::warn!("{}", e),
            }
        }
    }

    fn knobs(&mut self, ui: &mut egui::Ui, playing: bool) {
        let (tempo_label, pitch_label, selector_label) = if playing {
            ("Tempo", "Transpose", "Scale")
        } else {
            ("Gate", "Pitch", "Octaves / Scale")
        };

        ui.horizontal(|ui| {
            ui.label(tempo_label);
            ui.add(egui::Slider::new(&mut self.frame.tempo, 0.0..=1.0).show_value(false));
            ui.add_space(10.0);
            ui.label(pitch_label);
            ui.add(egui::Slider::new(&mut self.frame.pitch, 0.0..=1.0).show_value(false));
            ui.add_space(10.0);
            ui.label(selector_label);
            ui.add(egui::Slider::new(&mut self.frame.selector, 0.0..=1.0).show_value(false));
        });
    }

    /// Buttons report a held level, like the hardware switches. Keys mirror them.
    fn buttons(&mut self, ui: &mut egui::Ui, playing: bool) {
        let (space, left_key, right_key) = ui.ctx().input(|i| {
            (
                i.key_down(egui::Key::Space),
                i.key_down(egui::Key::ArrowLeft),
                i.key_down(egui::Key::ArrowRight),
            )
        });

        ui.horizontal(|ui| {
            let size = egui::vec2(90.0, 40.0);
            let left = ui.add(egui::Button::new("◀ Left").min_size(size));
            let play_text = if playing { "⏸ Stop" } else { "▶ Play" };
            let play = ui.add(egui::Button::new(play_text).min_size(size));
            let right = ui.add(egui::Button::new("Right ▶").min_size(size));

            self.frame.left = left_key || left.is_pointer_button_down_on();
            self.frame.play = space || play.is_pointer_button_down_on();
            self.frame.right = right_key || right.is_pointer_button_down_on();

            ui.add_space(20.0);
            lamp(ui, "Beat", self.instrument.lamps().beat_lit());
            lamp(ui, "Bar", self.instrument.lamps().downbeat_lit());
            lamp(ui, "Gate", self.cv.gate_high());
        });
    }

    fn display_panel(&self, ui: &mut egui::Ui) {
        let Some(snapshot) = &self.screen.snapshot else {
            return;
        };

        egui::Frame::dark_canvas(ui.style()).show(ui, |ui| {
            ui.horizontal(|ui| {
                let mode = match snapshot.mode {
                    PlaybackMode::Playing => "PLAY",
                    PlaybackMode::Stopped => "EDIT",
                };
                ui.monospace(mode);
                ui.monospace(snapshot.position_label());
                ui.monospace(snapshot.note_label());
                ui.monospace(format!("gate {:.0}%", snapshot.gate * 100.0));
                if snapshot.transpose != 0 {
                    ui.monospace(format!("{:+} st", snapshot.transpose));
                }
                if let Some(overlay) = &snapshot.overlay {
                    ui.colored_label(egui::Color32::YELLOW, overlay.label());
                }
            });
            ui.add_space(6.0);
            step_bars(ui, snapshot);
        });
    }
}

#[cfg(feature = "gui")]
impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.run_tick();
        let playing = self.instrument.controller().is_playing();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("STEPCV - CV Step Sequencer");
            ui.add_space(10.0);

            self.midi_port_selector(ui);
            ui.add_space(10.0);

            self.display_panel(ui);
            ui.add_space(10.0);

            self.knobs(ui, playing);
            ui.add_space(10.0);
            self.buttons(ui, playing);

            ui.separator();
            ui.label(format!(
                "CV {:.2} V  (duty {:.0}%)",
                self.cv.volts(),
                self.cv.level() * 100.0
            ));
            ui.label("Hold Left + Right to randomize. Space / arrow keys mirror the buttons.");
            if !self.midi_output.is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - CV and audio preview only",
                );
            }
        });
    }
}

#[cfg(feature = "gui")]
fn lamp(ui: &mut egui::Ui, label: &str, lit: bool) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
    let color = if lit {
        egui::Color32::from_rgb(100, 200, 100)
    } else {
        egui::Color32::from_rgb(40, 40, 40)
    };
    ui.painter().circle_filled(rect.center(), 6.0, color);
    ui.label(label);
}

/// One bar per active step: height is pitch, width is gate length.
#[cfg(feature = "gui")]
fn step_bars(ui: &mut egui::Ui, snapshot: &Snapshot) {
    let height = 120.0;
    let slot = 36.0;
    let width = slot * snapshot.capacity.max(1) as f32;
    let (response, painter) =
        ui.allocate_painter(egui::vec2(width, height), egui::Sense::hover());
    let origin = response.rect.min;

    let (low, high) = snapshot.pitch_span().unwrap_or((0, 0));
    let span = f32::from(high.saturating_sub(low)).max(12.0);

    for (i, (pitch, gate)) in snapshot.steps.iter().enumerate() {
        let is_current = i == snapshot.current_step;
        let rise = if *pitch == 0 {
            4.0
        } else {
            8.0 + f32::from(pitch.saturating_sub(low)) / span * (height - 12.0)
        };
        let bar = egui::Rect::from_min_size(
            origin + egui::vec2(i as f32 * slot + 2.0, height - rise),
            egui::vec2((slot - 4.0) * gate.clamp(0.1, 1.0), rise),
        );
        let color = if is_current {
            egui::Color32::from_rgb(100, 200, 100)
        } else {
            egui::Color32::from_rgb(60, 60, 200)
        };
        painter.rect_filled(bar, 2.0, color);
    }
}

#[cfg(not(feature = "gui"))]
mod headless {
    use std::thread;
    use std::time::{Duration, Instant};

    use stepcv::{
        Config, ControlFrame, CvGateOutput, DisplaySink, Instrument, MidiOutputDevice, Snapshot,
        StepSink,
    };

    const QUANTUM: Duration = Duration::from_millis(1);

    /// Writes display snapshots to the log.
    struct LogDisplay;

    impl DisplaySink for LogDisplay {
        fn show(&mut self, snapshot: &Snapshot) {
            log::trace!(
                "{} {} gate {:.2} bpm {:.1}",
                snapshot.position_label(),
                snapshot.note_label(),
                snapshot.gate,
                snapshot.bpm
            );
            if let Some(overlay) = &snapshot.overlay {
                log::trace!("{}", overlay.label());
            }
        }
    }

    /// Plays the configured pattern with the knobs parked, until interrupted.
    pub fn run(config: Config) {
        let mut instrument = Instrument::from_config(&config);
        let mut cv = CvGateOutput::new(config.voltage_mapper());
        let mut midi_output = MidiOutputDevice::new(config.midi_channel());
        if let Some(port) = config.midi_port() {
            if let Err(e) = midi_output.connect_by_name(port) {
                log::warn!("MIDI output unavailable: {}", e);
            }
        }
        let mut display = LogDisplay;

        let frame = ControlFrame {
            tempo: 0.5,
            pitch: 0.5,
            ..Default::default()
        };

        instrument.controller_mut().start();
        log::info!(
            "playing {} steps at {:.1} BPM",
            instrument.controller().pattern().len(),
            instrument.controller().bpm()
        );

        let mut last = Instant::now();
        loop {
            thread::sleep(QUANTUM);
            let now = Instant::now();
            let delta_seconds = now.duration_since(last).as_secs_f32();
            last = now;

            let tick = instrument.tick(delta_seconds, &frame);
            if let Some(event) = &tick.event {
                log::trace!(
                    "step {} pitch {} gate {:.2} cv {:.2}V",
                    event.step_index,
                    event.pitch,
                    event.gate,
                    cv.mapper().volts(event.pitch)
                );
            }

            let mut sinks: [&mut dyn StepSink; 2] = [&mut cv, &mut midi_output];
            Instrument::dispatch(&tick, delta_seconds, &mut sinks);

            if let Some(snapshot) = &tick.snapshot {
                display.show(snapshot);
            }
        }
    }
}
