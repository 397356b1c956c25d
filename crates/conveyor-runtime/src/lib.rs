//! Container runtime backends for Conveyor builds.
//!
//! This crate implements the execution layer the build engine talks to: the
//! pluggable `ContainerRuntime` trait, a backend that drives the `docker` or
//! `podman` command line, an in-memory mock backend used by tests and dry runs,
//! image reference parsing, and prerequisite checking.

pub mod backend;
pub mod cli;
pub mod image;
pub mod mock;
pub mod prereq;

#[cfg(test)]
mod testutil;

pub use backend::{select_runtime, ContainerRuntime, ContainerSpec, VolumeMount};
pub use cli::CliRuntime;
pub use image::ImageRef;
pub use mock::{MockCall, MockOp, MockRuntime};
pub use prereq::{check_runtime_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

/// Label key attached to every volume and container Conveyor creates.
pub const MANAGED_LABEL: &str = "conveyor";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("no such image: {0}")]
    ImageNotFound(String),
    #[error("no such object: {0}")]
    NotFound(String),
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}
