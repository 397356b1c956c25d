use crate::backend::{ContainerRuntime, ContainerSpec};
use crate::image::ImageRef;
use crate::RuntimeError;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// Runtime operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MockOp {
    CreateVolume,
    CreateContainer,
    PullImage,
    StartContainer,
    StreamLogs,
    WaitContainer,
    RemoveContainer,
    RemoveVolume,
}

/// One recorded call against the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateVolume,
    CreateContainer { name: String, image: String },
    PullImage { repository: String, tag: String },
    StartContainer(String),
    StreamLogs(String),
    WaitContainer(String),
}

#[derive(Debug, Default)]
struct MockVolume {
    labels: BTreeMap<String, String>,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug)]
struct MockContainer {
    spec: ContainerSpec,
    run: Option<ScriptResult>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    volumes: BTreeMap<String, MockVolume>,
    local_images: BTreeSet<String>,
    unpullable: BTreeSet<String>,
    containers: BTreeMap<String, MockContainer>,
    failures: BTreeMap<MockOp, String>,
    calls: Vec<MockCall>,
}

impl MockState {
    fn fail_if_injected(&self, op: MockOp) -> Result<(), RuntimeError> {
        match self.failures.get(&op) {
            Some(msg) => Err(RuntimeError::ExecFailed(msg.clone())),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:012x}", self.next_id)
    }

    fn container(&self, id: &str) -> Result<&MockContainer, RuntimeError> {
        self.containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {id}")))
    }
}

/// In-memory container runtime.
///
/// Containers run a small shell subset (`echo`, `touch`, `cat`, `exit`,
/// `true`, `false`, joined by `;`, `&&` or newlines) against the files of
/// their mounted volume, so sequential steps observe each other's writes.
/// Images are absent locally until pulled; every image is pullable unless
/// marked otherwise.
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }
}

fn normalize_image(image: &str) -> String {
    ImageRef::parse(image).to_string()
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    /// Mark an image as already present locally.
    #[must_use]
    pub fn with_local_image(self, image: &str) -> Self {
        let image = normalize_image(image);
        self.with_state(|s| {
            s.local_images.insert(image);
        })
    }

    /// Make pulls of this image fail as if the repository did not exist.
    #[must_use]
    pub fn with_unpullable_image(self, image: &str) -> Self {
        let image = normalize_image(image);
        self.with_state(|s| {
            s.unpullable.insert(image);
        })
    }

    /// Make every call of `op` fail with `message`.
    #[must_use]
    pub fn with_failure(self, op: MockOp, message: &str) -> Self {
        let message = message.to_owned();
        self.with_state(|s| {
            s.failures.insert(op, message);
        })
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn pull_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::PullImage { .. }))
            .count()
    }

    pub fn has_local_image(&self, image: &str) -> bool {
        let image = normalize_image(image);
        self.lock()
            .map(|s| s.local_images.contains(&image))
            .unwrap_or(false)
    }

    /// The spec a container was created with, looked up by container name.
    pub fn container_spec(&self, name: &str) -> Option<ContainerSpec> {
        let state = self.lock().ok()?;
        state
            .containers
            .values()
            .find(|c| c.spec.name == name)
            .map(|c| c.spec.clone())
    }

    pub fn volume_labels(&self, volume: &str) -> Option<BTreeMap<String, String>> {
        let state = self.lock().ok()?;
        state.volumes.get(volume).map(|v| v.labels.clone())
    }

    pub fn volume_file(&self, volume: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.lock().ok()?;
        state.volumes.get(volume)?.files.get(path).cloned()
    }

    pub fn container_count(&self) -> usize {
        self.lock().map(|s| s.containers.len()).unwrap_or(0)
    }

    pub fn volume_count(&self) -> usize {
        self.lock().map(|s| s.volumes.len()).unwrap_or(0)
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn create_volume(&self, labels: &BTreeMap<String, String>) -> Result<String, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::CreateVolume);
        state.fail_if_injected(MockOp::CreateVolume)?;
        let name = state.next_id("vol");
        state.volumes.insert(
            name.clone(),
            MockVolume {
                labels: labels.clone(),
                files: BTreeMap::new(),
            },
        );
        Ok(name)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.lock()?;
        let image = normalize_image(&spec.image);
        state.calls.push(MockCall::CreateContainer {
            name: spec.name.clone(),
            image: image.clone(),
        });
        if !state.local_images.contains(&image) {
            return Err(RuntimeError::ImageNotFound(image));
        }
        state.fail_if_injected(MockOp::CreateContainer)?;
        if state.containers.values().any(|c| c.spec.name == spec.name) {
            return Err(RuntimeError::ExecFailed(format!(
                "container name \"/{}\" is already in use",
                spec.name
            )));
        }
        for m in &spec.mounts {
            if !state.volumes.contains_key(&m.volume) {
                return Err(RuntimeError::NotFound(format!("volume {}", m.volume)));
            }
        }
        let id = state.next_id("ctr");
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                run: None,
            },
        );
        Ok(id)
    }

    fn pull_image(&self, repository: &str, tag: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::PullImage {
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        });
        state.fail_if_injected(MockOp::PullImage)?;
        let image = format!("{repository}:{tag}");
        if state.unpullable.contains(&image) {
            return Err(RuntimeError::ExecFailed(format!(
                "pull access denied for {repository}, repository does not exist"
            )));
        }
        state.local_images.insert(image);
        Ok(())
    }

    fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::StartContainer(id.to_owned()));
        state.fail_if_injected(MockOp::StartContainer)?;
        let spec = state.container(id)?.spec.clone();
        let script = shell_script(&spec.command);

        let mut scratch = BTreeMap::new();
        let files = match spec.mounts.first() {
            Some(m) => match state.volumes.get_mut(&m.volume) {
                Some(v) => &mut v.files,
                None => return Err(RuntimeError::NotFound(format!("volume {}", m.volume))),
            },
            None => &mut scratch,
        };
        let result = run_script(&script, files);

        if let Some(c) = state.containers.get_mut(id) {
            c.run = Some(result);
        }
        Ok(())
    }

    fn stream_logs(
        &self,
        id: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::StreamLogs(id.to_owned()));
        state.fail_if_injected(MockOp::StreamLogs)?;
        if let Some(run) = &state.container(id)?.run {
            stdout.write_all(&run.stdout)?;
            stderr.write_all(&run.stderr)?;
        }
        Ok(())
    }

    fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::WaitContainer(id.to_owned()));
        state.fail_if_injected(MockOp::WaitContainer)?;
        match &state.container(id)?.run {
            Some(run) => Ok(run.exit_code),
            None => Err(RuntimeError::ExecFailed(format!(
                "container {id} was never started"
            ))),
        }
    }

    fn list_containers(&self, label: &str) -> Result<Vec<String>, RuntimeError> {
        let state = self.lock()?;
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| c.spec.labels.contains_key(label))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.fail_if_injected(MockOp::RemoveContainer)?;
        state
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(format!("container {id}")))
    }

    fn list_volumes(&self, label: &str) -> Result<Vec<String>, RuntimeError> {
        let state = self.lock()?;
        Ok(state
            .volumes
            .iter()
            .filter(|(_, v)| v.labels.contains_key(label))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.fail_if_injected(MockOp::RemoveVolume)?;
        let in_use = state
            .containers
            .values()
            .any(|c| c.spec.mounts.iter().any(|m| m.volume == name));
        if in_use {
            return Err(RuntimeError::ExecFailed(format!(
                "remove {name}: volume is in use"
            )));
        }
        state
            .volumes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(format!("volume {name}")))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ScriptResult {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i64,
}

/// Extract the script from `sh -c <script>`, or treat the argv as one.
fn shell_script(command: &[String]) -> String {
    match command {
        [sh, flag, script, ..] if sh.ends_with("sh") && flag == "-c" => script.clone(),
        other => other.join(" "),
    }
}

fn unquote(word: &str) -> &str {
    word.trim_matches(|c| c == '"' || c == '\'')
}

enum Flow {
    Continue(i64),
    Exit(i64),
}

fn run_script(script: &str, files: &mut BTreeMap<String, Vec<u8>>) -> ScriptResult {
    let mut out = ScriptResult::default();
    for line in script.lines() {
        for list in line.split(';') {
            for simple in list.split("&&") {
                match run_simple(simple, files, &mut out) {
                    Flow::Exit(code) => {
                        out.exit_code = code;
                        return out;
                    }
                    Flow::Continue(code) => {
                        out.exit_code = code;
                        if code != 0 {
                            break;
                        }
                    }
                }
            }
        }
    }
    out
}

fn run_simple(
    command: &str,
    files: &mut BTreeMap<String, Vec<u8>>,
    out: &mut ScriptResult,
) -> Flow {
    let words: Vec<&str> = command.split_whitespace().map(unquote).collect();
    let Some((&program, args)) = words.split_first() else {
        return Flow::Continue(out.exit_code);
    };
    match program {
        "echo" => {
            let (text, target) = match args.iter().position(|a| *a == ">") {
                Some(pos) => (&args[..pos], args.get(pos + 1)),
                None => (args, None),
            };
            let mut line = text.join(" ").into_bytes();
            line.push(b'\n');
            match target {
                Some(path) => {
                    files.insert((*path).to_owned(), line);
                }
                None => out.stdout.extend_from_slice(&line),
            }
            Flow::Continue(0)
        }
        "touch" => {
            for path in args {
                files.entry((*path).to_owned()).or_default();
            }
            Flow::Continue(0)
        }
        "cat" => {
            let mut code = 0;
            for path in args {
                match files.get(*path) {
                    Some(content) => out.stdout.extend_from_slice(content),
                    None => {
                        out.stderr.extend_from_slice(
                            format!("cat: {path}: No such file or directory\n").as_bytes(),
                        );
                        code = 1;
                    }
                }
            }
            Flow::Continue(code)
        }
        "exit" => Flow::Exit(args.first().and_then(|a| a.parse().ok()).unwrap_or(0)),
        "true" => Flow::Continue(0),
        "false" => Flow::Continue(1),
        other => {
            out.stderr
                .extend_from_slice(format!("sh: 1: {other}: not found\n").as_bytes());
            Flow::Continue(127)
        }
    }
}
