pub mod completions;
pub mod doctor;
pub mod prune;
pub mod run;
pub mod validate;

use conveyor_core::BuildReport;
use std::fmt::Write as _;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PIPELINE_ERROR: u8 = 2;
pub const EXIT_RUNTIME_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "COMPLETED" => Style::new().green().apply_to(state).to_string(),
        "RUNNING" => Style::new().cyan().bold().apply_to(state).to_string(),
        "READY" => Style::new().yellow().apply_to(state).to_string(),
        "FAILED" => Style::new().red().bold().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

fn step_status(completed: bool, successful: bool) -> &'static str {
    match (completed, successful) {
        (false, _) => "pending",
        (true, true) => "ok",
        (true, false) => "failed",
    }
}

/// Render a build report as a summary line followed by a step table.
pub fn render_report(report: &BuildReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "build '{}': {}",
        report.name,
        colorize_state(&report.state.to_string())
    );
    if let Some(volume) = &report.volume {
        let _ = writeln!(out, "volume: {volume}");
    }
    for err in &report.errors {
        let _ = writeln!(out, "error: {err}");
    }
    if let Some(step) = report.failed_step() {
        let _ = writeln!(out, "failed at: {}", step.name);
    }
    if report.steps.is_empty() {
        let _ = writeln!(out, "no steps");
        return out;
    }
    let _ = writeln!(out, "{:<20} {:<28} {:<8} ERRORS", "STEP", "IMAGE", "STATUS");
    for step in &report.steps {
        let image = format!("{}:{}", step.image, step.image_tag);
        let _ = writeln!(
            out,
            "{:<20} {:<28} {:<8} {}",
            step.name,
            image,
            step_status(step.completed, step.successful),
            step.errors.join("; ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::{BuildState, StepReport};

    fn step(name: &str, completed: bool, successful: bool, errors: &[&str]) -> StepReport {
        StepReport {
            name: name.to_owned(),
            image: "ubuntu".to_owned(),
            image_tag: "latest".to_owned(),
            commands: vec!["true".to_owned()],
            completed,
            successful,
            errors: errors.iter().map(|e| (*e).to_owned()).collect(),
        }
    }

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_state_keeps_text() {
        for state in ["COMPLETED", "RUNNING", "READY", "FAILED"] {
            assert!(colorize_state(state).contains(state));
        }
    }

    #[test]
    fn colorize_state_unknown() {
        assert_eq!(colorize_state("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_PIPELINE_ERROR);
        assert_ne!(EXIT_PIPELINE_ERROR, EXIT_RUNTIME_ERROR);
    }

    #[test]
    fn render_report_lists_steps_and_errors() {
        let report = BuildReport {
            name: "demo".to_owned(),
            state: BuildState::Failed,
            volume: Some("vol-1".to_owned()),
            errors: Vec::new(),
            steps: vec![
                step("one", true, true, &[]),
                step("two", true, false, &["exit status 1"]),
                step("three", false, false, &[]),
            ],
        };
        let text = render_report(&report);
        assert!(text.contains("build 'demo'"));
        assert!(text.contains("FAILED"));
        assert!(text.contains("volume: vol-1"));
        assert!(text.contains("failed at: two"));
        assert!(text.contains("ubuntu:latest"));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.iter().any(|l| l.starts_with("one") && l.contains("ok")));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("two") && l.contains("failed") && l.contains("exit status 1")));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("three") && l.contains("pending")));
    }

    #[test]
    fn render_report_empty_pipeline() {
        let report = BuildReport {
            name: "empty".to_owned(),
            state: BuildState::Completed,
            volume: None,
            errors: Vec::new(),
            steps: Vec::new(),
        };
        let text = render_report(&report);
        assert!(text.contains("no steps"));
        assert!(!text.contains("volume:"));
        assert!(!text.contains("failed at:"));
    }
}
