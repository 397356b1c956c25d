use crate::CoreError;
use conveyor_runtime::{ContainerRuntime, MANAGED_LABEL};
use std::collections::BTreeMap;
use tracing::debug;

/// Provisions the shared workspace volume of a build.
///
/// Volumes are labeled with the build name so cleanup tooling can find them;
/// removing them is not the engine's job.
pub struct VolumeManager<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> VolumeManager<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    pub fn labels(build_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(MANAGED_LABEL.to_owned(), build_name.to_owned())])
    }

    pub fn provision(&self, build_name: &str) -> Result<String, CoreError> {
        let volume = self
            .runtime
            .create_volume(&Self::labels(build_name))
            .map_err(|source| CoreError::VolumeProvision {
                build: build_name.to_owned(),
                source,
            })?;
        debug!("provisioned volume {volume} for build '{build_name}'");
        Ok(volume)
    }
}
