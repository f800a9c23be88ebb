//! Configuration persistence for the looper.
//!
//! Saves and loads looper configuration to/from YAML files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::midi::{BEATS_PER_BAR, CLOCKS_PER_BEAT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("output channel must be 1-16, got {0}")]
    Channel(u8),
    #[error("loop length must be at least one bar")]
    LoopLength,
}

/// Complete looper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooperConfig {
    /// Substring of the MIDI input port to prefer
    #[serde(default = "default_port")]
    pub input_port: String,
    /// Substring of the MIDI output port to prefer
    #[serde(default = "default_port")]
    pub output_port: String,
    /// MIDI output channel (1-16, stored as 1-indexed for human readability)
    #[serde(default = "default_channel")]
    pub output_channel: u8,
    /// Loop length in 4/4 bars
    #[serde(default = "default_loop_length_bars")]
    pub loop_length_bars: u32,
    /// Pass incoming notes through to the output while not recording
    #[serde(default = "default_monitor_input")]
    pub monitor_input: bool,
}

fn default_port() -> String {
    "IAC".to_string()
}

fn default_channel() -> u8 {
    1 // 1-indexed for YAML readability
}

fn default_loop_length_bars() -> u32 {
    2
}

fn default_monitor_input() -> bool {
    true
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            input_port: default_port(),
            output_port: default_port(),
            output_channel: default_channel(),
            loop_length_bars: default_loop_length_bars(),
            monitor_input: default_monitor_input(),
        }
    }
}

impl LooperConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        let project_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        project_dir.join("looper_config.yaml")
    }

    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.output_channel) {
            return Err(ConfigError::Channel(self.output_channel));
        }
        if self.loop_length_bars == 0 {
            return Err(ConfigError::LoopLength);
        }
        Ok(())
    }

    /// Output channel as sent on the wire (0-15).
    pub fn channel_index(&self) -> u8 {
        self.output_channel.saturating_sub(1)
    }

    pub fn loop_length_clocks(&self) -> u64 {
        self.loop_length_bars as u64 * BEATS_PER_BAR * CLOCKS_PER_BEAT
    }
}
