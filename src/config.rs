//! Run options for the simulation driver.
//!
//! Options can be built in code or loaded from a YAML/JSON file:
//!
//! ```yaml
//! debug: false
//! level: 2
//! states: true
//! temp_dir: /tmp
//! nworkers: 4
//! quiet: false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during options loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for options operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Options for one simulation run.
///
/// `debug`, `level` and `states` are forwarded to the code generator;
/// the rest drive compilation and worker supervision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimOptions {
    /// Generate simulator debug output
    #[serde(default)]
    pub debug: bool,

    /// Log message verbosity passed to the generator
    #[serde(default = "default_level")]
    pub level: i64,

    /// Print device states at end of simulation
    #[serde(default)]
    pub states: bool,

    /// Directory for per-run build directories
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Number of worker processes
    #[serde(default = "default_nworkers")]
    pub nworkers: usize,

    /// Suppress the per-line worker echo on stdout
    #[serde(default)]
    pub quiet: bool,
}

fn default_level() -> i64 {
    1
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_nworkers() -> usize {
    1
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            debug: false,
            level: default_level(),
            states: false,
            temp_dir: default_temp_dir(),
            nworkers: default_nworkers(),
            quiet: false,
        }
    }
}

impl SimOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    pub fn with_workers(mut self, nworkers: usize) -> Self {
        self.nworkers = nworkers;
        self
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Suppresses the worker echo.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Loads options from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let options: SimOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let options: SimOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml(&std::fs::read_to_string(path)?),
            "json" => Self::from_json(&std::fs::read_to_string(path)?),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the options.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.nworkers == 0 {
            return Err(ConfigError::Validation(
                "nworkers must be at least 1".to_string(),
            ));
        }
        if self.level < 0 {
            return Err(ConfigError::Validation(format!(
                "level must be non-negative, got {}",
                self.level
            )));
        }
        Ok(())
    }
}
