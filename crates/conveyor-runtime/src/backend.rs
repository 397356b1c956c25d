use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// A named volume mounted into a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeMount {
    pub volume: String,
    pub target: String,
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    /// Full image reference, `repository:tag`.
    pub image: String,
    pub command: Vec<String>,
    pub mounts: Vec<VolumeMount>,
    pub working_dir: Option<String>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// Operations the build engine consumes from a container daemon.
///
/// Every call blocks until the daemon has answered. Implementations must be
/// shareable across threads so independent builds can drive one handle.
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Create a volume and return its name.
    fn create_volume(&self, labels: &BTreeMap<String, String>) -> Result<String, RuntimeError>;

    /// Create (but do not start) a container and return its id.
    ///
    /// Must return `RuntimeError::ImageNotFound` when the image is not present
    /// locally; the caller decides whether to pull.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    fn pull_image(&self, repository: &str, tag: &str) -> Result<(), RuntimeError>;

    fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Follow the container's output from the beginning until it stops
    /// producing output, copying stdout and stderr to the given sinks.
    fn stream_logs(
        &self,
        id: &str,
        stdout: &mut (dyn Write + Send),
        stderr: &mut (dyn Write + Send),
    ) -> Result<(), RuntimeError>;

    /// Block until the container exits and return its exit code.
    fn wait_container(&self, id: &str) -> Result<i64, RuntimeError>;

    /// Ids of all containers (running or not) carrying the label key.
    fn list_containers(&self, label: &str) -> Result<Vec<String>, RuntimeError>;

    fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Names of all volumes carrying the label key.
    fn list_volumes(&self, label: &str) -> Result<Vec<String>, RuntimeError>;

    fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;
}

pub fn select_runtime(name: &str) -> Result<Box<dyn ContainerRuntime>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::cli::CliRuntime::docker())),
        "podman" => Ok(Box::new(crate::cli::CliRuntime::podman())),
        "mock" => Ok(Box::new(crate::mock::MockRuntime::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_runtimes() {
        assert_eq!(select_runtime("docker").unwrap().name(), "docker");
        assert_eq!(select_runtime("podman").unwrap().name(), "podman");
        assert_eq!(select_runtime("mock").unwrap().name(), "mock");
    }

    #[test]
    fn select_invalid_runtime_fails() {
        assert!(matches!(
            select_runtime("containerd"),
            Err(RuntimeError::BackendUnavailable(n)) if n == "containerd"
        ));
    }
}
