use super::{EXIT_FAILURE, EXIT_SUCCESS};
use conveyor_runtime::{select_runtime, ContainerRuntime, MANAGED_LABEL};

pub fn run(runtime_name: &str, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let runtime = match select_runtime(runtime_name) {
        Ok(rt) => {
            checks.push(Check::pass(
                "runtime_known",
                &format!("Runtime '{runtime_name}' is supported"),
            ));
            rt
        }
        Err(e) => {
            checks.push(Check::fail("runtime_known", &e.to_string()));
            return print_results(&checks, false, json_output);
        }
    };

    check_prereqs(runtime.as_ref(), &mut checks, &mut all_pass);
    if all_pass {
        check_leftovers(runtime.as_ref(), &mut checks);
    }

    print_results(&checks, all_pass, json_output)
}

fn check_prereqs(runtime: &dyn ContainerRuntime, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if runtime.name() == "mock" {
        checks.push(Check::info(
            "runtime_prereqs",
            "Mock runtime has no external prerequisites",
        ));
        return;
    }

    let missing = conveyor_runtime::check_runtime_prereqs(runtime.name());
    if missing.is_empty() {
        checks.push(Check::pass(
            "runtime_prereqs",
            &format!("{} CLI found and daemon responding", runtime.name()),
        ));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "runtime_prereqs",
            &format!(
                "Missing prerequisites: {}",
                conveyor_runtime::format_missing(&missing)
            ),
        ));
    }
}

fn check_leftovers(runtime: &dyn ContainerRuntime, checks: &mut Vec<Check>) {
    match runtime.list_containers(MANAGED_LABEL) {
        Ok(ids) if ids.is_empty() => {
            checks.push(Check::pass("containers", "No leftover build containers"));
        }
        Ok(ids) => checks.push(Check::warn(
            "containers",
            &format!(
                "{} leftover build containers (remove with `conveyor prune`)",
                ids.len()
            ),
        )),
        Err(e) => checks.push(Check::warn(
            "containers",
            &format!("Cannot list containers: {e}"),
        )),
    }

    match runtime.list_volumes(MANAGED_LABEL) {
        Ok(vols) if vols.is_empty() => {
            checks.push(Check::pass("volumes", "No leftover build volumes"));
        }
        Ok(vols) => checks.push(Check::warn(
            "volumes",
            &format!(
                "{} leftover build volumes (remove with `conveyor prune`)",
                vols.len()
            ),
        )),
        Err(e) => checks.push(Check::warn("volumes", &format!("Cannot list volumes: {e}"))),
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("Conveyor Doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn with_status(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::with_status(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::with_status(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::with_status(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::with_status(name, "info", message)
    }
}
