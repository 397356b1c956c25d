//! Build execution engine for Conveyor pipelines.
//!
//! This crate ties the pipeline schema and the container runtime together into
//! a `Build`: a state machine that provisions a shared workspace volume, runs
//! each step in its own container in pipeline order, pulls missing images once,
//! captures step output, and stops at the first failing step. It also provides
//! lifecycle transition validation and serializable build reports.

pub mod engine;
pub mod executor;
pub mod lifecycle;
pub mod pipeline;
pub mod report;
pub mod step;
pub mod volume;

pub use engine::{Build, LogSink};
pub use executor::{StepContext, StepError, StepExecutor, WORKSPACE_PATH};
pub use lifecycle::{validate_transition, BuildState};
pub use pipeline::{NextStep, Pipeline};
pub use report::{BuildReport, StepReport};
pub use step::Step;
pub use volume::VolumeManager;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] conveyor_schema::PipelineError),
    #[error("failed to provision volume for build '{build}': {source}")]
    VolumeProvision {
        build: String,
        #[source]
        source: conveyor_runtime::RuntimeError,
    },
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("build '{0}' is running without a volume")]
    MissingVolume(String),
}
