//! Pipeline definition parsing and validation for Conveyor.
//!
//! This crate defines the schema layer: the TOML pipeline file (`PipelineFile`)
//! with its ordered step definitions, and the validation rules a definition must
//! pass before the build engine consumes it.

pub mod pipeline;

pub use pipeline::{
    parse_pipeline_file, parse_pipeline_str, PipelineError, PipelineFile, StepDefinition,
    SUPPORTED_VERSION,
};
