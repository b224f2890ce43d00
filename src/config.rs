// config.rs

use crate::player::PlayerConfig;
use crate::scheduler::SchedulerConfig;
use config::{Config, ConfigError, Environment, File};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "midistep.toml";
pub const ENV_PREFIX: &str = "MIDISTEP";

/// Runtime settings, merged from built-in defaults, an optional TOML file
/// and `MIDISTEP_*` environment variables. Command-line flags are applied
/// on top by the binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub quantize: u32,
    /// Swing amount in percent (50 = 50%)
    pub swing: f64,
    pub schedule_ahead_secs: f64,
    pub wake_interval_ms: u64,
    pub drum_channel: u8,
    pub bass_channel: u8,
    pub velocity: u8,
    pub drum_gate_secs: f64,
    pub bass_gate_secs: f64,
    #[serde(default)]
    pub midi_output: Option<String>,
}

impl Settings {
    /// Loads settings from `path`, or from `midistep.toml` in the working
    /// directory if it exists, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(path, true)
    }

    /// Same as [`Settings::load`] without the environment layer
    pub fn load_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(path, false)
    }

    fn build(path: Option<&Path>, with_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("quantize", 16)?
            .set_default("swing", 0.0)?
            .set_default("schedule_ahead_secs", 0.1)?
            .set_default("wake_interval_ms", 25)?
            .set_default("drum_channel", 9)?
            .set_default("bass_channel", 0)?
            .set_default("velocity", 100)?
            .set_default("drum_gate_secs", 0.05)?
            .set_default("bass_gate_secs", 0.25)?;

        builder = match path {
            Some(path) => {
                info!("Reading settings from {}", path.display());
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        if with_env {
            builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drum_channel > 15 || self.bass_channel > 15 {
            return Err(ConfigError::Message(format!(
                "MIDI channels must be 0-15 (drum {}, bass {})",
                self.drum_channel, self.bass_channel
            )));
        }
        if self.velocity > 127 {
            return Err(ConfigError::Message(format!(
                "velocity must be 0-127, got {}",
                self.velocity
            )));
        }
        if !self.swing.is_finite() || self.swing < 0.0 {
            return Err(ConfigError::Message(format!(
                "swing must be a non-negative percentage, got {}",
                self.swing
            )));
        }
        if self.schedule_ahead_secs.is_nan() || self.schedule_ahead_secs <= 0.0 || self.wake_interval_ms == 0 {
            return Err(ConfigError::Message(
                "schedule_ahead_secs and wake_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Swing as a fraction, the unit the extractor works in
    pub fn swing_fraction(&self) -> f64 {
        self.swing / 100.0
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            schedule_ahead_secs: self.schedule_ahead_secs,
            wake_interval: Duration::from_millis(self.wake_interval_ms),
        }
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            drum_channel: self.drum_channel,
            bass_channel: self.bass_channel,
            velocity: self.velocity,
            drum_gate_secs: self.drum_gate_secs,
            bass_gate_secs: self.bass_gate_secs,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quantize: 16,
            swing: 0.0,
            schedule_ahead_secs: 0.1,
            wake_interval_ms: 25,
            drum_channel: 9,
            bass_channel: 0,
            velocity: 100,
            drum_gate_secs: 0.05,
            bass_gate_secs: 0.25,
            midi_output: None,
        }
    }
}
