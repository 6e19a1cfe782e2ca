use std::path::PathBuf;

use serde::Deserialize;

use crate::control::ControlSettings;
use crate::sequencer::clock::{DEFAULT_BPM, MAX_BPM, MIN_BPM};
use crate::sequencer::presets::Preset;
use crate::sequencer::MAX_PITCH;
use crate::voltage::{VoltageMapper, BASE_PITCH, OUTPUT_CEILING};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

pub const MAX_CAPACITY: usize = 64;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    sequencer: SequencerConfig,
    #[serde(default)]
    controls: ControlsConfig,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Deserialize, Default)]
struct SequencerConfig {
    capacity: Option<usize>,
    bpm: Option<f32>,
    preset: Option<String>,
    root: Option<u8>,
    octaves: Option<u8>,
}

#[derive(Deserialize, Default)]
struct ControlsConfig {
    bpm_min: Option<f32>,
    bpm_max: Option<f32>,
    bpm_curve: Option<f32>,
    tempo_threshold: Option<u16>,
    pitch_threshold: Option<u16>,
    transpose_range: Option<i32>,
}

#[derive(Deserialize, Default)]
struct OutputConfig {
    max_voltage: Option<f32>,
    midi_port: Option<String>,
    midi_channel: Option<u8>,
    audio_preview: Option<bool>,
    display_interval_ms: Option<u64>,
}

pub struct Config {
    sequencer: SequencerConfig,
    controls: ControlsConfig,
    output: OutputConfig,
}

impl Config {
    /// Embedded defaults, overlaid with the user's config file if present.
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => {
                            log::info!(target: "config", "loaded {}", path.display());
                            merge(&mut base, user);
                        }
                        Err(e) => {
                            log::warn!(
                                target: "config",
                                "ignoring malformed config {}: {}",
                                path.display(),
                                e
                            )
                        }
                    },
                    Err(e) => {
                        log::warn!(
                            target: "config",
                            "could not read config {}: {}",
                            path.display(),
                            e
                        )
                    }
                }
            }
        }

        Self::from_file(base)
    }

    /// Parse a config document on top of the embedded defaults. Malformed
    /// input leaves the defaults in place.
    pub fn from_toml_str(contents: &str) -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        match toml::from_str::<ConfigFile>(contents) {
            Ok(user) => merge(&mut base, user),
            Err(e) => log::warn!(target: "config", "ignoring malformed config: {}", e),
        }
        Self::from_file(base)
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            sequencer: file.sequencer,
            controls: file.controls,
            output: file.output,
        }
    }

    /// Number of steps the pattern can hold (1..=64)
    pub fn capacity(&self) -> usize {
        self.sequencer.capacity.unwrap_or(16).clamp(1, MAX_CAPACITY)
    }

    pub fn bpm(&self) -> f32 {
        match self.sequencer.bpm {
            Some(bpm) if bpm.is_finite() => bpm.clamp(MIN_BPM, MAX_BPM),
            _ => DEFAULT_BPM,
        }
    }

    /// Unknown preset names fall back to the default pattern.
    pub fn preset(&self) -> Preset {
        match self.sequencer.preset.as_deref() {
            Some(name) => Preset::parse(name).unwrap_or_else(|| {
                log::warn!(target: "config", "unknown preset '{}', using default", name);
                Preset::Default
            }),
            None => Preset::Default,
        }
    }

    pub fn control_settings(&self) -> ControlSettings {
        let fallback = ControlSettings::default();
        let bpm_min = clamp_bpm(self.controls.bpm_min, fallback.bpm_min);
        let bpm_max = clamp_bpm(self.controls.bpm_max, fallback.bpm_max);
        let (bpm_min, bpm_max) = if bpm_min <= bpm_max {
            (bpm_min, bpm_max)
        } else {
            (bpm_max, bpm_min)
        };

        ControlSettings {
            bpm_min,
            bpm_max,
            bpm_curve: self
                .controls
                .bpm_curve
                .filter(|c| c.is_finite() && *c > 0.0)
                .unwrap_or(fallback.bpm_curve),
            tempo_threshold: self
                .controls
                .tempo_threshold
                .unwrap_or(fallback.tempo_threshold)
                .clamp(1, 512),
            pitch_threshold: self
                .controls
                .pitch_threshold
                .unwrap_or(fallback.pitch_threshold)
                .clamp(1, 512),
            transpose_range: self
                .controls
                .transpose_range
                .unwrap_or(fallback.transpose_range)
                .clamp(0, 24),
            root: self.sequencer.root.unwrap_or(BASE_PITCH).min(MAX_PITCH),
            octaves: self.sequencer.octaves.unwrap_or(fallback.octaves).clamp(1, 8),
        }
    }

    pub fn voltage_mapper(&self) -> VoltageMapper {
        VoltageMapper::new(BASE_PITCH, self.output.max_voltage.unwrap_or(OUTPUT_CEILING))
    }

    pub fn midi_port(&self) -> Option<&str> {
        self.output.midi_port.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// 1-based MIDI channel
    pub fn midi_channel(&self) -> u8 {
        self.output.midi_channel.unwrap_or(1).clamp(1, 16)
    }

    pub fn audio_preview(&self) -> bool {
        self.output.audio_preview.unwrap_or(true)
    }

    /// Seconds between display snapshots
    pub fn display_interval(&self) -> f32 {
        self.output.display_interval_ms.unwrap_or(100).clamp(10, 1_000) as f32 / 1000.0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml_str("")
    }
}

fn clamp_bpm(value: Option<f32>, fallback: f32) -> f32 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
        .clamp(MIN_BPM, MAX_BPM)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stepcv").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_sequencer(&mut base.sequencer, user.sequencer);
    merge_controls(&mut base.controls, user.controls);
    merge_output(&mut base.output, user.output);
}

fn merge_sequencer(base: &mut SequencerConfig, user: SequencerConfig) {
    if user.capacity.is_some() {
        base.capacity = user.capacity;
    }
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.preset.is_some() {
        base.preset = user.preset;
    }
    if user.root.is_some() {
        base.root = user.root;
    }
    if user.octaves.is_some() {
        base.octaves = user.octaves;
    }
}

fn merge_controls(base: &mut ControlsConfig, user: ControlsConfig) {
    if user.bpm_min.is_some() {
        base.bpm_min = user.bpm_min;
    }
    if user.bpm_max.is_some() {
        base.bpm_max = user.bpm_max;
    }
    if user.bpm_curve.is_some() {
        base.bpm_curve = user.bpm_curve;
    }
    if user.tempo_threshold.is_some() {
        base.tempo_threshold = user.tempo_threshold;
    }
    if user.pitch_threshold.is_some() {
        base.pitch_threshold = user.pitch_threshold;
    }
    if user.transpose_range.is_some() {
        base.transpose_range = user.transpose_range;
    }
}

fn merge_output(base: &mut OutputConfig, user: OutputConfig) {
    if user.max_voltage.is_some() {
        base.max_voltage = user.max_voltage;
    }
    if user.midi_port.is_some() {
        base.midi_port = user.midi_port;
    }
    if user.midi_channel.is_some() {
        base.midi_channel = user.midi_channel;
    }
    if user.audio_preview.is_some() {
        base.audio_preview = user.audio_preview;
    }
    if user.display_interval_ms.is_some() {
        base.display_interval_ms = user.display_interval_ms;
    }
}
