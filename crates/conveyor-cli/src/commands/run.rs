use super::{json_pretty, render_report, EXIT_FAILURE, EXIT_SUCCESS};
use conveyor_core::{Build, BuildState};
use conveyor_runtime::ContainerRuntime;
use conveyor_schema::parse_pipeline_file;
use std::path::Path;
use tracing::{debug, info};

pub fn run(
    runtime: &dyn ContainerRuntime,
    pipeline_path: &Path,
    name: Option<&str>,
    quiet: bool,
    json: bool,
) -> Result<u8, String> {
    let mut def = parse_pipeline_file(pipeline_path).map_err(|e| e.to_string())?;
    if let Some(name) = name {
        name.clone_into(&mut def.name);
    }
    let mut build = Build::from_definition(&def).map_err(|e| e.to_string())?;
    debug!(
        "loaded pipeline '{}' from {} ({} steps)",
        build.name(),
        pipeline_path.display(),
        build.pipeline().len()
    );

    if !quiet {
        // Keep stdout clean for the JSON document.
        if json {
            build.set_output_stream(Box::new(std::io::stderr()));
        } else {
            build.set_output_stream(Box::new(std::io::stdout()));
        }
        build.set_error_stream(Box::new(std::io::stderr()));
    }

    info!("running build '{}' on {}", build.name(), runtime.name());
    let outcome = build.run(runtime);
    let report = build.report();

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    match outcome {
        Ok(BuildState::Completed) => Ok(EXIT_SUCCESS),
        Ok(_) => Ok(EXIT_FAILURE),
        Err(e) => Err(e.to_string()),
    }
}
