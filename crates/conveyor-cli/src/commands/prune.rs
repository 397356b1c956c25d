use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use conveyor_runtime::{ContainerRuntime, MANAGED_LABEL};
use tracing::warn;

/// What a prune pass removed (or, for a dry run, would remove).
#[derive(Debug, Default)]
struct PruneOutcome {
    containers: Vec<String>,
    volumes: Vec<String>,
    failures: Vec<String>,
}

fn prune(runtime: &dyn ContainerRuntime, dry_run: bool) -> Result<PruneOutcome, String> {
    let containers = runtime
        .list_containers(MANAGED_LABEL)
        .map_err(|e| e.to_string())?;
    let volumes = runtime
        .list_volumes(MANAGED_LABEL)
        .map_err(|e| e.to_string())?;

    if dry_run {
        return Ok(PruneOutcome {
            containers,
            volumes,
            failures: Vec::new(),
        });
    }

    let mut outcome = PruneOutcome::default();
    // Containers first: a volume cannot be removed while a container mounts it.
    for id in containers {
        match runtime.remove_container(&id) {
            Ok(()) => outcome.containers.push(id),
            Err(e) => {
                warn!("failed to remove container {id}: {e}");
                outcome.failures.push(format!("container {id}: {e}"));
            }
        }
    }
    for volume in volumes {
        match runtime.remove_volume(&volume) {
            Ok(()) => outcome.volumes.push(volume),
            Err(e) => {
                warn!("failed to remove volume {volume}: {e}");
                outcome.failures.push(format!("volume {volume}: {e}"));
            }
        }
    }
    Ok(outcome)
}

pub fn run(runtime: &dyn ContainerRuntime, dry_run: bool, json: bool) -> Result<u8, String> {
    let outcome = prune(runtime, dry_run)?;

    if json {
        let payload = serde_json::json!({
            "dry_run": dry_run,
            "containers": outcome.containers,
            "volumes": outcome.volumes,
            "failures": outcome.failures,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let prefix = if dry_run { "would remove" } else { "removed" };
        println!(
            "prune: {prefix} {} containers, {} volumes",
            outcome.containers.len(),
            outcome.volumes.len()
        );
        for failure in &outcome.failures {
            println!("  failed: {failure}");
        }
    }

    Ok(if outcome.failures.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::{Build, BuildState, Pipeline, Step};
    use conveyor_runtime::{MockOp, MockRuntime};

    fn leftover_build(rt: &MockRuntime) {
        let mut build = Build::new(
            "leftover",
            Pipeline::new(vec![
                Step::new("one", "ubuntu", ["true"]),
                Step::new("two", "ubuntu", ["true"]),
            ]),
        );
        assert_eq!(build.run(rt).unwrap(), BuildState::Completed);
    }

    #[test]
    fn dry_run_keeps_resources() {
        let rt = MockRuntime::new().with_local_image("ubuntu");
        leftover_build(&rt);
        assert_eq!(run(&rt, true, true).unwrap(), EXIT_SUCCESS);
        assert_eq!(rt.container_count(), 2);
        assert_eq!(rt.volume_count(), 1);
    }

    #[test]
    fn removes_containers_then_volumes() {
        let rt = MockRuntime::new().with_local_image("ubuntu");
        leftover_build(&rt);
        assert_eq!(run(&rt, false, true).unwrap(), EXIT_SUCCESS);
        assert_eq!(rt.container_count(), 0);
        assert_eq!(rt.volume_count(), 0);
    }

    #[test]
    fn nothing_to_prune() {
        let rt = MockRuntime::new();
        assert_eq!(run(&rt, false, false).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn dry_run_lists_candidates() {
        let rt = MockRuntime::new().with_local_image("ubuntu");
        leftover_build(&rt);
        let outcome = prune(&rt, true).unwrap();
        assert_eq!(outcome.containers.len(), 2);
        assert_eq!(outcome.volumes.len(), 1);
    }

    #[test]
    fn failed_removals_are_not_reported_as_removed() {
        let rt = MockRuntime::new()
            .with_local_image("ubuntu")
            .with_failure(MockOp::RemoveVolume, "volume is busy");
        leftover_build(&rt);

        let outcome = prune(&rt, false).unwrap();
        assert_eq!(outcome.containers.len(), 2);
        assert!(outcome.volumes.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].contains("volume is busy"));
        assert_eq!(rt.container_count(), 0);
        assert_eq!(rt.volume_count(), 1);
    }

    #[test]
    fn failed_removal_exits_nonzero() {
        let rt = MockRuntime::new()
            .with_local_image("ubuntu")
            .with_failure(MockOp::RemoveContainer, "permission denied");
        leftover_build(&rt);
        assert_eq!(run(&rt, false, true).unwrap(), EXIT_FAILURE);
        assert_eq!(rt.container_count(), 2);
    }
}
