use std::fmt;
use std::process::{Command, Stdio};

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Plain `info` without a format template: docker and podman expose different
/// fields, but both exit non-zero when the daemon or socket is unreachable.
fn daemon_responds(binary: &str) -> bool {
    Command::new(binary)
        .arg("info")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Check prerequisites for a CLI-driven container runtime.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_runtime_prereqs(binary: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(binary) {
        missing.push(MissingPrereq {
            name: binary.to_owned(),
            purpose: "running pipeline steps in containers",
            install_hint: "apt install docker.io | dnf install podman | pacman -S docker",
        });
    } else if !daemon_responds(binary) {
        missing.push(MissingPrereq {
            name: format!("{binary} daemon"),
            purpose: "creating volumes and containers",
            install_hint: "start the daemon (systemctl start docker) and check socket permissions",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nConveyor needs a container runtime to execute pipeline steps.");
    msg
}
