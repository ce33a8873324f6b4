//! Configuration for pin assignment and poll timing.
//!
//! Values come from a TOML file and can be overridden on the command line:
//!
//! ```toml
//! input_pin = 26
//! output_pin = 13
//! poll_interval_ms = 100
//! ```
//!
//! Without `--config`, the file is looked up under the user config directory
//! (`~/.config/buzzbutton/config.toml` on Linux). A missing file there is not an
//! error; the defaults apply.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::controller::MonitorSettings;
use crate::hardware::PinAssignment;

const CONFIG_DIR: &str = "buzzbutton";
const CONFIG_FILE: &str = "config.toml";

// Highest line on the 40-pin header in BCM numbering
const MAX_BCM_PIN: u8 = 27;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command-line options.
#[derive(Parser, Debug, Default)]
#[command(name = "buzzbutton", version, about = "Sound a buzzer while a button is held")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// BCM number of the button line (active-low)
    #[arg(long)]
    pub input_pin: Option<u8>,

    /// BCM number of the buzzer line
    #[arg(long)]
    pub output_pin: Option<u8>,

    /// Poll period in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Write the default config file and exit
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub input_pin: u8,
    pub output_pin: u8,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_pin: 26,
            output_pin: 13,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the effective configuration: file, then CLI overrides, then validation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(cli);
        config.validate()?;
        info!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(pin) = cli.input_pin {
            self.input_pin = pin;
        }
        if let Some(pin) = cli.output_pin {
            self.output_pin = pin;
        }
        if let Some(ms) = cli.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.input_pin == self.output_pin {
            return Err(ConfigError::Invalid(format!(
                "input_pin and output_pin are both {}",
                self.input_pin
            )));
        }
        for (name, pin) in [("input_pin", self.input_pin), ("output_pin", self.output_pin)] {
            if pin > MAX_BCM_PIN {
                return Err(ConfigError::Invalid(format!(
                    "{} {} is outside BCM 0..={}",
                    name, pin, MAX_BCM_PIN
                )));
            }
        }
        Ok(())
    }

    /// Write the default configuration to `path` unless a file already exists.
    ///
    /// Returns `true` when a file was written.
    pub fn ensure_default_config(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            debug!("Config file {} already exists", path.display());
            return Ok(false);
        }

        let write_err = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(&Self::default()).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, content).map_err(|e| write_err(e.to_string()))?;

        info!("Wrote default config to {}", path.display());
        Ok(true)
    }

    pub fn pins(&self) -> PinAssignment {
        PinAssignment {
            input_pin: self.input_pin,
            output_pin: self.output_pin,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval_ms: self.poll_interval_ms,
            ..MonitorSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli_with_file(path: &Path) -> Cli {
        Cli {
            config: Some(path.to_path_buf()),
            ..Cli::default()
        }
    }

    #[test]
    fn defaults_match_original_wiring() {
        let config = Config::default();
        assert_eq!(config.input_pin, 26);
        assert_eq!(config.output_pin, 13);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_ms = 50\n").unwrap();

        let config = Config::resolve(&cli_with_file(&path)).unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.input_pin, 26);
    }

    #[test]
    fn cli_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "input_pin = 17\noutput_pin = 18\n").unwrap();

        let cli = Cli {
            output_pin: Some(22),
            poll_interval_ms: Some(20),
            ..cli_with_file(&path)
        };
        let config = Config::resolve(&cli).unwrap();
        assert_eq!(config.pins().input_pin, 17);
        assert_eq!(config.pins().output_pin, 22);
        assert_eq!(config.monitor_settings().poll_interval_ms, 20);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let cli = cli_with_file(&dir.path().join("absent.toml"));
        assert!(matches!(Config::resolve(&cli), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "input_pin = \"twenty six\"\n").unwrap();
        assert!(matches!(
            Config::resolve(&cli_with_file(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let zero_interval = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(zero_interval.validate().is_err());

        let same_pins = Config {
            output_pin: 26,
            ..Config::default()
        };
        assert!(same_pins.validate().is_err());

        let off_header = Config {
            input_pin: 40,
            ..Config::default()
        };
        assert!(off_header.validate().is_err());
    }

    #[test]
    fn default_config_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(Config::ensure_default_config(&path).unwrap());
        assert!(!Config::ensure_default_config(&path).unwrap());
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "buzzbutton",
            "--input-pin",
            "5",
            "--output-pin",
            "6",
            "--poll-interval-ms",
            "250",
        ]);
        assert_eq!(cli.input_pin, Some(5));
        assert_eq!(cli.output_pin, Some(6));
        assert_eq!(cli.poll_interval_ms, Some(250));
        assert!(!cli.init_config);
    }
}
