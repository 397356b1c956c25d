use conveyor_runtime::ImageRef;

/// One unit of pipeline work, executed as a single container run.
///
/// `completed` flips to true exactly once, at the end of the step's only
/// execution attempt. `successful` is meaningful only after that and is true
/// only when the container exited with status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    image: String,
    image_tag: String,
    commands: Vec<String>,
    completed: bool,
    successful: bool,
    errors: Vec<String>,
}

impl Step {
    /// Create a step. A tag embedded in `image` is split off into the tag
    /// field; without one the tag is `latest`.
    pub fn new<I, S>(name: impl Into<String>, image: &str, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ImageRef { repository, tag } = ImageRef::parse(image);
        Self {
            name: name.into(),
            image: repository,
            image_tag: tag,
            commands: commands.into_iter().map(Into::into).collect(),
            completed: false,
            successful: false,
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image repository, without tag.
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// `repository:tag`, as handed to the runtime.
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.image_tag)
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// The command list joined into the single shell invocation the
    /// container runs.
    pub fn script(&self) -> String {
        self.commands.join(" ")
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub(crate) fn record_success(&mut self) {
        self.completed = true;
        self.successful = true;
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        self.completed = true;
        self.successful = false;
        self.errors.push(message);
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
