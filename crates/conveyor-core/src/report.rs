use crate::lifecycle::BuildState;
use crate::step::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub image: String,
    pub image_tag: String,
    pub commands: Vec<String>,
    pub completed: bool,
    pub successful: bool,
    pub errors: Vec<String>,
}

impl From<&Step> for StepReport {
    fn from(step: &Step) -> Self {
        Self {
            name: step.name().to_owned(),
            image: step.image().to_owned(),
            image_tag: step.image_tag().to_owned(),
            commands: step.commands().to_vec(),
            completed: step.is_completed(),
            successful: step.is_successful(),
            errors: step.errors().to_vec(),
        }
    }
}

/// Final (or in-flight) state of a build, as read by result renderers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildReport {
    pub name: String,
    pub state: BuildState,
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub steps: Vec<StepReport>,
}

impl BuildReport {
    /// The step that ended the build, if any.
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.completed && !s.successful)
    }
}
