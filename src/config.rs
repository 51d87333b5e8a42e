// Configuration - JSON settings for ports, pattern file and queue sizes

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequencer::SequencerOptions;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "ssq.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime configuration; every field is optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MIDI input port of the control surface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_input: Option<String>,
    /// MIDI output port for control surface feedback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_output: Option<String>,
    /// MIDI output ports played by the sequencer, in device id order
    pub seq_output: Vec<String>,
    pub pattern_file: PathBuf,
    pub poll_interval_us: u64,
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
    pub note_pool_size: usize,
    /// Fixed seed for the random play mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_input: None,
            control_output: None,
            seq_output: Vec::new(),
            pattern_file: PathBuf::from("pattern.ssq"),
            poll_interval_us: 100,
            command_queue_capacity: 256,
            event_queue_capacity: 1024,
            note_pool_size: 1024,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Load from a JSON file; a missing file gives the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn sequencer_options(&self) -> SequencerOptions {
        SequencerOptions {
            poll_interval: Duration::from_micros(self.poll_interval_us),
            command_queue_capacity: self.command_queue_capacity,
            event_queue_capacity: self.event_queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ssq.json");
        std::fs::write(
            &path,
            r#"{ "control_input": "nanoKONTROL", "seq_output": ["synth a", "synth b"], "rng_seed": 7 }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.control_input.as_deref(), Some("nanoKONTROL"));
        assert_eq!(config.seq_output, vec!["synth a", "synth b"]);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.poll_interval_us, 100);
        assert_eq!(config.pattern_file, PathBuf::from("pattern.ssq"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ssq.json");
        std::fs::write(&path, "{ control_input: ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config {
            control_output: Some("leds".to_string()),
            note_pool_size: 64,
            ..Config::default()
        };
        let json = config.to_json().unwrap();
        assert!(!json.contains("control_input"));
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_sequencer_options() {
        let config = Config {
            poll_interval_us: 250,
            event_queue_capacity: 8,
            ..Config::default()
        };
        let options = config.sequencer_options();
        assert_eq!(options.poll_interval, Duration::from_micros(250));
        assert_eq!(options.event_queue_capacity, 8);
        assert_eq!(options.command_queue_capacity, 256);
    }
}
