mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_PIPELINE_ERROR, EXIT_RUNTIME_ERROR};
use conveyor_runtime::{check_runtime_prereqs, format_missing, select_runtime};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "conveyor",
    version,
    about = "Run linear build pipelines as a sequence of containers sharing one workspace"
)]
struct Cli {
    /// Container runtime to drive: docker, podman, or mock.
    #[arg(long, default_value = "docker", global = true)]
    runtime: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every step of a pipeline file in order, stopping at the first failure.
    Run {
        /// Path to pipeline TOML file.
        #[arg(default_value = "conveyor.toml")]
        pipeline: PathBuf,
        /// Build name (defaults to the name in the pipeline file).
        #[arg(long)]
        name: Option<String>,
        /// Discard step output instead of echoing it.
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Parse and validate a pipeline file without running it.
    Validate {
        /// Path to pipeline TOML file.
        #[arg(default_value = "conveyor.toml")]
        pipeline: PathBuf,
    },
    /// Remove containers and volumes left behind by previous builds.
    Prune {
        /// Only report what would be removed.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Run diagnostic checks on the selected container runtime.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CONVEYOR_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let needs_runtime = matches!(cli.command, Commands::Run { .. } | Commands::Prune { .. });
    if needs_runtime
        && cli.runtime != "mock"
        && std::env::var("CONVEYOR_SKIP_PREREQS").as_deref() != Ok("1")
    {
        let missing = check_runtime_prereqs(&cli.runtime);
        if !missing.is_empty() {
            eprintln!("error: {}", format_missing(&missing));
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    }

    let result = match cli.command {
        Commands::Run {
            pipeline,
            name,
            quiet,
        } => select_runtime(&cli.runtime)
            .map_err(|e| e.to_string())
            .and_then(|runtime| {
                commands::run::run(
                    runtime.as_ref(),
                    &pipeline,
                    name.as_deref(),
                    quiet,
                    json_output,
                )
            }),
        Commands::Validate { pipeline } => commands::validate::run(&pipeline, json_output),
        Commands::Prune { dry_run } => select_runtime(&cli.runtime)
            .map_err(|e| e.to_string())
            .and_then(|runtime| commands::prune::run(runtime.as_ref(), dry_run, json_output)),
        Commands::Doctor => commands::doctor::run(&cli.runtime, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("pipeline error:")
                || msg.starts_with("failed to parse pipeline")
                || msg.starts_with("failed to read pipeline file")
            {
                EXIT_PIPELINE_ERROR
            } else if msg.starts_with("backend '") || msg.starts_with("runtime I/O error") {
                EXIT_RUNTIME_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
