use super::{json_pretty, EXIT_SUCCESS};
use conveyor_schema::parse_pipeline_file;
use std::path::Path;

pub fn run(pipeline_path: &Path, json: bool) -> Result<u8, String> {
    let def = parse_pipeline_file(pipeline_path).map_err(|e| e.to_string())?;
    def.validate().map_err(|e| format!("pipeline error: {e}"))?;

    if json {
        let payload = serde_json::json!({
            "valid": true,
            "name": def.name,
            "steps": def.steps.iter().map(|s| serde_json::json!({
                "name": s.name,
                "image": s.image,
                "commands": s.commands,
            })).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("pipeline '{}' is valid ({} steps)", def.name, def.steps.len());
        for (i, step) in def.steps.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, step.name, step.image);
        }
    }
    Ok(EXIT_SUCCESS)
}
