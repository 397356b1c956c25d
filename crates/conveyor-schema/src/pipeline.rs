use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pipeline: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported pipeline version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("build name must not be empty")]
    EmptyBuildName,
    #[error("step #{0} has an empty name")]
    EmptyStepName(usize),
    #[error("invalid step name '{0}': expected [A-Za-z0-9][A-Za-z0-9_.-]*")]
    InvalidStepName(String),
    #[error("duplicate step name '{0}'")]
    DuplicateStepName(String),
    #[error("step '{0}' has an empty image")]
    EmptyImage(String),
}

/// On-disk pipeline definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineFile {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl PipelineFile {
    /// Check the definition before it is handed to the engine.
    ///
    /// Step names become container names, so they must be unique and use the
    /// character set container daemons accept.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.version != SUPPORTED_VERSION {
            return Err(PipelineError::UnsupportedVersion(self.version));
        }
        if self.name.trim().is_empty() {
            return Err(PipelineError::EmptyBuildName);
        }

        let mut seen = BTreeSet::new();
        for (idx, step) in self.steps.iter().enumerate() {
            if step.name.is_empty() {
                return Err(PipelineError::EmptyStepName(idx));
            }
            if !is_valid_step_name(&step.name) {
                return Err(PipelineError::InvalidStepName(step.name.clone()));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::DuplicateStepName(step.name.clone()));
            }
            if step.image.trim().is_empty() {
                return Err(PipelineError::EmptyImage(step.name.clone()));
            }
        }
        Ok(())
    }
}

fn is_valid_step_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

pub fn parse_pipeline_str(input: &str) -> Result<PipelineFile, PipelineError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_pipeline_file(path: impl AsRef<Path>) -> Result<PipelineFile, PipelineError> {
    let content = fs::read_to_string(path)?;
    parse_pipeline_str(&content)
}
