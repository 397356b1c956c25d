use crate::step::Step;
use conveyor_schema::PipelineFile;

/// What the drive loop should do next with a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Every step finished successfully.
    Done,
    /// The step at this index has not run yet.
    Pending(usize),
    /// The step at this index ran and failed; nothing may run after it.
    Halted(usize),
}

/// Ordered steps of one build. The order and length never change after
/// construction; only the steps' own result fields do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub(crate) steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn from_definition(def: &PipelineFile) -> Self {
        Self::new(
            def.steps
                .iter()
                .map(|s| Step::new(s.name.clone(), &s.image, s.commands.iter().cloned()))
                .collect(),
        )
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn all_steps_successful(&self) -> bool {
        self.steps.iter().all(Step::is_successful)
    }

    /// Find the next step to execute.
    ///
    /// A completed but unsuccessful step is reported as `Halted` and is never
    /// handed out again, even if later steps are still pending.
    pub fn next_step(&self) -> NextStep {
        if self.all_steps_successful() {
            return NextStep::Done;
        }
        for (idx, step) in self.steps.iter().enumerate() {
            if step.is_completed() && !step.is_successful() {
                return NextStep::Halted(idx);
            }
            if !step.is_completed() {
                return NextStep::Pending(idx);
            }
        }
        NextStep::Done
    }
}

impl FromIterator<Step> for Pipeline {
    fn from_iter<T: IntoIterator<Item = Step>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
