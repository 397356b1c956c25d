use crate::executor::{StepContext, StepExecutor};
use crate::lifecycle::{validate_transition, BuildState};
use crate::pipeline::{NextStep, Pipeline};
use crate::report::{BuildReport, StepReport};
use crate::volume::VolumeManager;
use crate::CoreError;
use conveyor_runtime::ContainerRuntime;
use conveyor_schema::PipelineFile;
use std::io::Write;
use tracing::{debug, info, warn};

/// A byte sink receiving step container output.
pub type LogSink = Box<dyn Write + Send>;

/// One execution of a pipeline.
///
/// A build starts `Ready`, is driven in place by [`Build::run`], and ends
/// `Completed` when every step succeeded or `Failed` at the first step (or
/// volume provisioning) that did not. Terminal builds never change again;
/// retrying means constructing a new build.
pub struct Build {
    name: String,
    pipeline: Pipeline,
    state: BuildState,
    volume: Option<String>,
    errors: Vec<String>,
    stdout: Option<LogSink>,
    stderr: Option<LogSink>,
}

impl std::fmt::Debug for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Build")
            .field("name", &self.name)
            .field("pipeline", &self.pipeline)
            .field("state", &self.state)
            .field("volume", &self.volume)
            .field("errors", &self.errors)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

impl Build {
    /// Create a build whose step output is discarded.
    pub fn new(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            pipeline,
            state: BuildState::Ready,
            volume: None,
            errors: Vec::new(),
            stdout: None,
            stderr: None,
        }
    }

    /// Create a build that copies every step's stdout and stderr into the
    /// given sinks, in step order.
    pub fn with_log_streams(
        name: impl Into<String>,
        pipeline: Pipeline,
        stdout: LogSink,
        stderr: LogSink,
    ) -> Self {
        let mut build = Self::new(name, pipeline);
        build.stdout = Some(stdout);
        build.stderr = Some(stderr);
        build
    }

    /// Validate a parsed pipeline file and turn it into a ready build.
    pub fn from_definition(def: &PipelineFile) -> Result<Self, CoreError> {
        def.validate()?;
        Ok(Self::new(def.name.clone(), Pipeline::from_definition(def)))
    }

    pub fn set_output_stream(&mut self, sink: LogSink) {
        self.stdout = Some(sink);
    }

    pub fn set_error_stream(&mut self, sink: LogSink) {
        self.stderr = Some(sink);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// The shared workspace volume, once provisioned.
    pub fn volume(&self) -> Option<&str> {
        self.volume.as_deref()
    }

    /// Build-scoped diagnostics. Step failures are recorded on the steps.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn all_steps_successful(&self) -> bool {
        self.pipeline.all_steps_successful()
    }

    pub fn next_step(&self) -> NextStep {
        self.pipeline.next_step()
    }

    /// Drive the build until it reaches a terminal state.
    ///
    /// Steps run strictly in order; the first unsuccessful step ends the build
    /// `Failed` and later steps are left untouched. A step failure is reported
    /// through the returned state and the step's errors; an `Err` means the
    /// build could not get a workspace volume (the build is `Failed` as well).
    /// Calling this on a terminal build returns its state without doing
    /// anything.
    pub fn run(&mut self, runtime: &dyn ContainerRuntime) -> Result<BuildState, CoreError> {
        loop {
            match self.state {
                BuildState::Ready => self.prepare(runtime)?,
                BuildState::Running => self.advance(runtime)?,
                BuildState::Completed | BuildState::Failed => return Ok(self.state),
            }
        }
    }

    fn transition(&mut self, to: BuildState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        debug!("build '{}': {} -> {to}", self.name, self.state);
        self.state = to;
        Ok(())
    }

    fn prepare(&mut self, runtime: &dyn ContainerRuntime) -> Result<(), CoreError> {
        if self.pipeline.all_steps_successful() {
            info!("build '{}' has nothing to run", self.name);
            return self.transition(BuildState::Completed);
        }

        info!(
            "starting build '{}' ({} steps) on {}",
            self.name,
            self.pipeline.len(),
            runtime.name()
        );
        match VolumeManager::new(runtime).provision(&self.name) {
            Ok(volume) => {
                self.volume = Some(volume);
                self.transition(BuildState::Running)
            }
            Err(e) => {
                warn!("build '{}' failed: {e}", self.name);
                self.errors.push(e.to_string());
                self.transition(BuildState::Failed)?;
                Err(e)
            }
        }
    }

    fn advance(&mut self, runtime: &dyn ContainerRuntime) -> Result<(), CoreError> {
        let index = match self.pipeline.next_step() {
            NextStep::Done => {
                info!("build '{}' completed", self.name);
                return self.transition(BuildState::Completed);
            }
            NextStep::Halted(index) => {
                warn!(
                    "build '{}' halted at failed step '{}'",
                    self.name, self.pipeline.steps[index]
                );
                return self.transition(BuildState::Failed);
            }
            NextStep::Pending(index) => index,
        };

        let Some(volume) = self.volume.as_deref() else {
            return Err(CoreError::MissingVolume(self.name.clone()));
        };
        let mut discard_out = std::io::sink();
        let mut discard_err = std::io::sink();
        let stdout: &mut (dyn Write + Send) = match self.stdout.as_mut() {
            Some(sink) => &mut **sink,
            None => &mut discard_out,
        };
        let stderr: &mut (dyn Write + Send) = match self.stderr.as_mut() {
            Some(sink) => &mut **sink,
            None => &mut discard_err,
        };
        let mut ctx = StepContext {
            build_name: &self.name,
            volume,
            stdout,
            stderr,
        };

        let total = self.pipeline.steps.len();
        let step = &mut self.pipeline.steps[index];
        info!(
            "build '{}': step {}/{total} '{}' ({})",
            ctx.build_name,
            index + 1,
            step.name(),
            step.image_reference()
        );
        if StepExecutor::new(runtime).execute(step, &mut ctx).is_err() {
            return self.transition(BuildState::Failed);
        }
        Ok(())
    }

    /// Snapshot of the build and step results for reporting.
    pub fn report(&self) -> BuildReport {
        BuildReport {
            name: self.name.clone(),
            state: self.state,
            volume: self.volume.clone(),
            errors: self.errors.clone(),
            steps: self
                .pipeline
                .steps()
                .iter()
                .map(StepReport::from)
                .collect(),
        }
    }
}
