//! Run configuration
//!
//! A single JSON document with named, typed fields. Unknown keys are
//! rejected at load time and every physical constant is validated before a
//! simulation is built.
//!
//! ```json
//! {
//!   "temperature": 800.0,
//!   "voxel_size": 1.435,
//!   "cutoff": 6.0,
//!   "vacancy": { "id": 1 },
//!   "num_steps": 100000,
//!   "seed": 42,
//!   "structure": "init.dump",
//!   "model_weights": "model.json",
//!   "output_dir": "results"
//! }
//! ```

use crate::core_types::{AtomId, Hertz, Kelvin};
use crate::kmc::RateParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Attempt frequency used when the configuration does not set one (Hz)
pub const DEFAULT_ATTEMPT_FREQUENCY: f64 = 1e13;
/// Boltzmann constant in eV/K
pub const DEFAULT_BOLTZMANN_CONSTANT: f64 = 8.617333e-5;

fn default_attempt_frequency() -> f64 {
    DEFAULT_ATTEMPT_FREQUENCY
}

fn default_boltzmann_constant() -> f64 {
    DEFAULT_BOLTZMANN_CONSTANT
}

fn default_true() -> bool {
    true
}

fn default_log_file() -> String {
    "nnk.log".to_string()
}

fn default_init_map_file() -> String {
    "init_map.json".to_string()
}

/// How the vacancy is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacancySelection {
    /// Uniformly random atom, drawn from the run's seeded RNG
    Random,
    /// A specific atom id
    #[serde(untagged)]
    Fixed { id: AtomId },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to read the configuration file
    LoadFailed(String),
    /// Failed to parse the configuration, including unknown keys
    ParseFailed(String),
    /// A field holds an unusable value
    Invalid { field: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed(msg) => write!(f, "Failed to load config: {msg}"),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {msg}"),
            ConfigError::Invalid { field, message } => {
                write!(f, "Invalid config field '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything a run needs, as loaded from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Hz
    #[serde(default = "default_attempt_frequency")]
    pub attempt_frequency: f64,
    /// eV/K
    #[serde(default = "default_boltzmann_constant")]
    pub boltzmann_constant: f64,
    /// K
    pub temperature: f64,
    pub voxel_size: f64,
    /// Environment radius, same length unit as `voxel_size`
    pub cutoff: f64,
    pub vacancy: VacancySelection,
    /// Label of the first step, for continued runs
    #[serde(default)]
    pub init_step: u64,
    pub num_steps: u64,
    pub seed: u64,
    /// Rayon pool size for atom assignment; all cores when absent
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Write the vacancy id as the first log line
    #[serde(default = "default_true")]
    pub log_vacancy_id: bool,
    /// Initial LAMMPS dump
    pub structure: PathBuf,
    /// Barrier model weights (JSON)
    pub model_weights: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_init_map_file")]
    pub init_map_file: String,
}

impl SimulationConfig {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LoadFailed`] if the file cannot be read, and
    /// otherwise as [`SimulationConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Parse and validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFailed`] for malformed JSON, missing or
    /// unknown keys, and [`ConfigError::Invalid`] from validation.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("attempt_frequency", self.attempt_frequency),
            ("boltzmann_constant", self.boltzmann_constant),
            ("temperature", self.temperature),
            ("voxel_size", self.voxel_size),
            ("cutoff", self.cutoff),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("must be finite and positive, got {value}"),
                });
            }
        }

        if self.cutoff <= self.voxel_size {
            return Err(ConfigError::Invalid {
                field: "cutoff",
                message: format!(
                    "must exceed voxel_size ({} <= {})",
                    self.cutoff, self.voxel_size
                ),
            });
        }
        if self.num_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "num_steps",
                message: "must be at least 1".to_string(),
            });
        }
        if self.vacancy == (VacancySelection::Fixed { id: 0 }) {
            return Err(ConfigError::Invalid {
                field: "vacancy",
                message: "atom id 0 is reserved for empty sites".to_string(),
            });
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::Invalid {
                field: "num_threads",
                message: "must be at least 1".to_string(),
            });
        }
        for (field, name) in [("log_file", &self.log_file), ("init_map_file", &self.init_map_file)] {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Rate law constants
    pub fn rate_params(&self) -> RateParams {
        RateParams {
            attempt_frequency: Hertz::new(self.attempt_frequency),
            boltzmann_constant: self.boltzmann_constant,
            temperature: Kelvin::new(self.temperature),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }

    pub fn init_map_path(&self) -> PathBuf {
        self.output_dir.join(&self.init_map_file)
    }
}
