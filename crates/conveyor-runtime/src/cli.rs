use crate::backend::{ContainerRuntime, ContainerSpec};
use crate::RuntimeError;
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Drives a Docker-compatible daemon through its command line client.
pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn docker() -> Self {
        Self::new("docker")
    }

    pub fn podman() -> Self {
        Self::new("podman")
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run the client to completion and return its trimmed stdout.
    fn run<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = Command::new(&self.binary).args(args).output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
        } else {
            Err(RuntimeError::ExecFailed(client_error(&output.stderr)))
        }
    }
}

fn client_error(stderr: &[u8]) -> String {
    let msg = String::from_utf8_lossy(stderr).trim().to_owned();
    msg.strip_prefix("Error response from daemon: ")
        .or_else(|| msg.strip_prefix("Error: "))
        .unwrap_or(&msg)
        .to_owned()
}

/// Whether a client error means the image is absent from the local store.
pub fn is_missing_image_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("no such image")
        || lower.contains("image not known")
        || lower.contains("unable to find image")
}

fn label_args(labels: &BTreeMap<String, String>) -> Vec<String> {
    labels
        .iter()
        .flat_map(|(k, v)| ["--label".to_owned(), format!("{k}={v}")])
        .collect()
}

/// Arguments for `create`, with pulling disabled so a missing image surfaces
/// as an error instead of an implicit download.
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_owned(),
        "--pull".to_owned(),
        "never".to_owned(),
        "--name".to_owned(),
        spec.name.clone(),
    ];
    for m in &spec.mounts {
        args.push("--volume".to_owned());
        args.push(format!("{}:{}", m.volume, m.target));
    }
    if let Some(dir) = &spec.working_dir {
        args.push("--workdir".to_owned());
        args.push(dir.clone());
    }
    for (k, v) in &spec.env {
        args.push("--env".to_owned());
        args.push(format!("{k}={v}"));
    }
    args.extend(label_args(&spec.labels));
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

pub fn parse_exit_code(output: &str) -> Result<i64, RuntimeError> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse().ok())
        .ok_or_else(|| RuntimeError::ExecFailed(format!("unexpected wait output: '{output}'")))
}

/// Copy a client pipe into a sink. After a sink error the rest of the pipe is
/// still read and discarded, so the client never blocks on a full pipe.
fn drain_into(mut pipe: impl Read, sink: &mut (dyn Write + Send)) -> io::Result<u64> {
    match io::copy(&mut pipe, sink) {
        Ok(n) => Ok(n),
        Err(e) => {
            let _ = io::copy(&mut pipe, &mut io::sink());
            Err(e)
        }
    }
}

fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

impl ContainerRuntime for CliRuntime {
    fn name(&self) -> &str {
        &self.binary
    }

    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn create_volume(&self, labels: &BTreeMap<String, String>) -> Result<String, RuntimeError> {
        let mut args = vec!["volume".to_owned(), "create".to_owned()];
        args.extend(label_args(labels));
        let name = self.run(&args)?;
        if name.is_empty() {
            return Err(RuntimeError::ExecFailed(
                "volume create returned no name".to_owned(),
            ));
        }
        debug!("created volume {name}");
        Ok(name)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        match self.run(&create_args(spec)) {
            Ok(id) => {
                debug!("created container {} ({id})", spec.name);
                Ok(id)
            }
            Err(RuntimeError::ExecFailed(msg)) if is_missing_image_error(&msg) => {
                Err(RuntimeError::ImageNotFound(spec.image.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn pull_image(&self, repository: &str, tag: &str) -> Result<(), RuntimeError> {
        debug!("pulling {repository}:{tag}");
        self.run(["pull".to_owned(), format!("{repository}:{tag}")])?;
        Ok(())
    }

    fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(["start", id])?;
        Ok(())
    }

    fn stream_logs(
        &self,
        id: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<(), RuntimeError> {
        let mut child = Command::new(&self.binary)
            .args(["logs", "--follow", id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let out_pipe = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::ExecFailed("log stdout pipe missing".to_owned()))?;
        let err_pipe = child
            .stderr
            .take()
            .ok_or_else(|| RuntimeError::ExecFailed("log stderr pipe missing".to_owned()))?;

        // Both pipes must drain concurrently or the client blocks on a full one.
        let err_sink = &mut *stderr;
        let copied = std::thread::scope(|s| {
            let err_copy = s.spawn(move || drain_into(err_pipe, err_sink));
            let out_res = drain_into(out_pipe, stdout);
            if out_res.is_err() {
                // The client may keep following a running container.
                let _ = child.kill();
            }
            let err_res = err_copy
                .join()
                .map_err(|_| RuntimeError::ExecFailed("stderr log copy panicked".to_owned()))?;
            out_res?;
            err_res?;
            Ok::<(), RuntimeError>(())
        });

        let status = child.wait()?;
        copied?;
        stdout.flush()?;
        stderr.flush()?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::ExecFailed(format!(
                "{} logs {id} exited with {status}",
                self.binary
            )))
        }
    }

    fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let output = self.run(["wait", id])?;
        parse_exit_code(&output)
    }

    fn list_containers(&self, label: &str) -> Result<Vec<String>, RuntimeError> {
        let output = self.run([
            "ps".to_owned(),
            "--all".to_owned(),
            "--quiet".to_owned(),
            "--filter".to_owned(),
            format!("label={label}"),
        ])?;
        Ok(parse_lines(&output))
    }

    fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(["rm", id])?;
        Ok(())
    }

    fn list_volumes(&self, label: &str) -> Result<Vec<String>, RuntimeError> {
        let output = self.run([
            "volume".to_owned(),
            "ls".to_owned(),
            "--quiet".to_owned(),
            "--filter".to_owned(),
            format!("label={label}"),
        ])?;
        Ok(parse_lines(&output))
    }

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.run(["volume", "rm", name])?;
        Ok(())
    }
}
