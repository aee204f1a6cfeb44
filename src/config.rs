//! Run configuration.
//!
//! Every command accepts `--config <file.json>`; flags given on the command
//! line override the matching field. Missing fields take their defaults;
//! unknown fields are rejected.
//!
//! ```json
//! {
//!   "topology": "lcpn",
//!   "threshold": 0.7,
//!   "threads": 8,
//!   "aligner": { "command": "bwa mem -v 0 {index} {reads}", "timeout_secs": 300 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::align::AlignerConfig;
use crate::cascade::DEFAULT_MIN_SCORE;
use crate::core::types::Topology;
use crate::inference::DEFAULT_THRESHOLD;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CascadeConfig {
    pub topology: Topology,
    /// Confidence threshold for the final call, clamped into [0, 1]
    pub threshold: f64,
    /// Specialized species calls below this score are dropped
    pub specialized_min_score: f64,
    /// Worker threads; the global rayon pool when unset
    pub threads: Option<usize>,
    pub aligner: AlignerConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            topology: Topology::default(),
            threshold: DEFAULT_THRESHOLD,
            specialized_min_score: DEFAULT_MIN_SCORE,
            threads: None,
            aligner: AlignerConfig::default(),
        }
    }
}

impl CascadeConfig {
    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, is not valid JSON for
    /// this struct, or holds out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed JSON or out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// The file's config, or defaults when no file is given
    ///
    /// # Errors
    ///
    /// See [`CascadeConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_nan() {
            return Err(ConfigError::Invalid("threshold must be a number".to_string()));
        }
        if !self.specialized_min_score.is_finite() {
            return Err(ConfigError::Invalid(
                "specialized_min_score must be finite".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".to_string()));
        }
        if self.aligner.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "aligner.timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.aligner.command.contains("{reads}") {
            return Err(ConfigError::Invalid(
                "aligner.command must contain {reads}".to_string(),
            ));
        }
        Ok(())
    }
}
