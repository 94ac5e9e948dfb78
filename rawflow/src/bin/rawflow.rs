//! Command line checks for pipeline definitions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rawflow::observability::init_tracing;
use rawflow::pipeline::{compare_pipelines, load_snapshot, PipelineDefinition, Snapshot};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rawflow")]
#[command(version, about = "Inspect rawflow preprocessing pipeline definitions", long_about = None)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a definition file describes a valid pipeline
    Validate {
        /// Definition file (JSON object of stage parameters)
        definition: PathBuf,

        /// Known recording sessions, comma separated
        #[arg(short, long, value_delimiter = ',')]
        sessions: Vec<String>,
    },

    /// Show which stages changed between two definitions or snapshots
    Diff {
        /// Previous definition or snapshot
        old: PathBuf,

        /// Current definition or snapshot
        new: PathBuf,
    },
}

/// Reads a snapshot file, or derives the snapshot from a definition file.
fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let value: serde_json::Value = serde_json::from_reader(std::io::BufReader::new(
        std::fs::File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
    ))?;
    // snapshot entries carry their type tag
    let is_snapshot = value
        .as_object()
        .is_some_and(|stages| stages.values().all(|stage| stage.get("name").is_some()));
    if is_snapshot {
        return Ok(load_snapshot(path)?);
    }
    let definition = PipelineDefinition::from_value(&value)
        .with_context(|| format!("invalid definition in {}", path.display()))?;
    Ok(definition.snapshot())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("rawflow=info", cli.json_logs);

    match cli.command {
        Commands::Validate { definition, sessions } => {
            let definition = PipelineDefinition::from_json_file(&definition)
                .with_context(|| format!("cannot read {}", definition.display()))?;
            definition.validate(&sessions)?;
            println!("{} stages OK", definition.len());
        }
        Commands::Diff { old, new } => {
            let diff = compare_pipelines(&read_snapshot(&old)?, &read_snapshot(&new)?)?;
            for (name, status) in &diff.stages {
                println!("{:>8}  {name}", status.to_string());
            }
            if !diff.decompositions.is_empty() {
                println!();
                let stages: Vec<&str> = diff.decompositions.keys().map(String::as_str).collect();
                println!("ICA files may be outdated for: {}", stages.join(", "));
            }
        }
    }
    Ok(())
}
