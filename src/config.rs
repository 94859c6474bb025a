//! YAML configuration for the whole propdoc pipeline.
//!
//! One file configures every stage: classifier thresholds and artifact
//! paths, rule-table location, and matcher settings including the registry
//! source.
//!
//! ## Example
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! classify:
//!   rules_path: "config/rules.yaml"
//!   samples_path: "data/samples.json"
//!   model_path: "data/model.json"
//!   use_model: true
//!   sample_score_threshold: 0.8
//!   model_confidence_threshold: 0.9
//!   auto_train: false
//!   min_samples_for_training: 10
//!   incremental_learning: true
//!
//! matcher:
//!   similarity_threshold: 0.8
//!   top_n: 3
//!   registry_path: "data/registry.csv"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pdoc_classify::ClassifyConfig;
use pdoc_match::MatchConfig;

/// Errors that can occur when loading a pipeline configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Matcher section: the match config plus where to load the registry from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherSection {
    #[serde(flatten)]
    pub config: MatchConfig,

    /// CSV registry source. Absent means matching is skipped entirely.
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropdocConfig {
    /// Configuration format version.
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub classify: ClassifyConfig,

    #[serde(default)]
    pub matcher: MatcherSection,
}

impl PropdocConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PropdocConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }
        self.classify
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        self.matcher
            .config
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;
        Ok(())
    }
}

impl Default for PropdocConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            classify: ClassifyConfig::default(),
            matcher: MatcherSection::default(),
        }
    }
}
