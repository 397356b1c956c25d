use crate::step::Step;
use conveyor_runtime::{ContainerRuntime, ContainerSpec, RuntimeError, VolumeMount, MANAGED_LABEL};
use std::collections::BTreeMap;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Where the build volume is mounted in every step container. Also the
/// working directory of the step's shell.
pub const WORKSPACE_PATH: &str = "/workspace";

pub const STEP_LABEL: &str = "conveyor.step";

/// Failures scoped to a single step. The message of the error is what gets
/// recorded on the step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step '{0}' has already been executed")]
    AlreadyCompleted(String),
    #[error("failed to pull image {image}: {source}")]
    ImagePull {
        image: String,
        #[source]
        source: RuntimeError,
    },
    #[error("failed to create container: {0}")]
    ContainerCreate(#[source] RuntimeError),
    #[error("failed to start container: {0}")]
    ContainerStart(#[source] RuntimeError),
    #[error("failed to stream container logs: {0}")]
    LogStream(#[source] RuntimeError),
    #[error("failed to wait for container: {0}")]
    ContainerWait(#[source] RuntimeError),
    #[error("exit status {0}")]
    NonZeroExit(i64),
}

/// Per-build bindings a step runs with.
pub struct StepContext<'a> {
    pub build_name: &'a str,
    pub volume: &'a str,
    pub stdout: &'a mut (dyn Write + Send),
    pub stderr: &'a mut (dyn Write + Send),
}

/// Runs one step in a fresh container bound to the build volume.
pub struct StepExecutor<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> StepExecutor<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    pub fn container_spec(step: &Step, build_name: &str, volume: &str) -> ContainerSpec {
        ContainerSpec {
            name: step.name().to_owned(),
            image: step.image_reference(),
            command: vec!["/bin/sh".to_owned(), "-c".to_owned(), step.script()],
            mounts: vec![VolumeMount {
                volume: volume.to_owned(),
                target: WORKSPACE_PATH.to_owned(),
            }],
            working_dir: Some(WORKSPACE_PATH.to_owned()),
            env: BTreeMap::from([
                ("CONVEYOR_BUILD_NAME".to_owned(), build_name.to_owned()),
                ("CONVEYOR_STEP_NAME".to_owned(), step.name().to_owned()),
                ("CONVEYOR_STEP_IMAGE".to_owned(), step.image_reference()),
            ]),
            labels: BTreeMap::from([
                (MANAGED_LABEL.to_owned(), build_name.to_owned()),
                (STEP_LABEL.to_owned(), step.name().to_owned()),
            ]),
        }
    }

    /// Execute `step` and record the outcome on it.
    ///
    /// On failure the step ends completed, unsuccessful, with exactly one new
    /// error message; the same error is returned. A step that has already
    /// run is refused without being touched.
    pub fn execute(&self, step: &mut Step, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        if step.is_completed() {
            return Err(StepError::AlreadyCompleted(step.name().to_owned()));
        }

        match self.run_container(step, ctx) {
            Ok(()) => {
                info!("step '{}' succeeded", step.name());
                step.record_success();
                Ok(())
            }
            Err(e) => {
                warn!("step '{}' failed: {e}", step.name());
                step.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    fn run_container(&self, step: &Step, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let spec = Self::container_spec(step, ctx.build_name, ctx.volume);
        let id = self.create_container(step, &spec)?;

        self.runtime
            .start_container(&id)
            .map_err(StepError::ContainerStart)?;
        debug!("started container {id} for step '{}'", step.name());

        self.runtime
            .stream_logs(&id, &mut *ctx.stdout, &mut *ctx.stderr)
            .map_err(StepError::LogStream)?;

        let code = self
            .runtime
            .wait_container(&id)
            .map_err(StepError::ContainerWait)?;
        debug!("container {id} exited with {code}");

        if code == 0 {
            Ok(())
        } else {
            Err(StepError::NonZeroExit(code))
        }
    }

    /// Create the container, pulling the image once if it is not present
    /// locally and retrying creation exactly once after the pull.
    fn create_container(&self, step: &Step, spec: &ContainerSpec) -> Result<String, StepError> {
        match self.runtime.create_container(spec) {
            Ok(id) => Ok(id),
            Err(RuntimeError::ImageNotFound(_)) => {
                info!(
                    "image {} not present locally, pulling",
                    step.image_reference()
                );
                self.runtime
                    .pull_image(step.image(), step.image_tag())
                    .map_err(|source| StepError::ImagePull {
                        image: step.image_reference(),
                        source,
                    })?;
                self.runtime
                    .create_container(spec)
                    .map_err(StepError::ContainerCreate)
            }
            Err(e) => Err(StepError::ContainerCreate(e)),
        }
    }
}
