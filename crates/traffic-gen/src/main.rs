//! Radio exercise traffic generator
//!
//! Reads an exercise config (TOML) and an optional template file, generates
//! the full message set and writes it as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Generate to stdout
//! traffic-gen --config uebung.toml --templates vorlagen.txt
//!
//! # Reproducible run with statistics, written to a file
//! traffic-gen --config uebung.toml --seed 42 --stats --output uebung.json --pretty
//!
//! # Override quotas from the environment
//! TRAFFIC_DICTATION_MINIMUM=3 traffic-gen --config uebung.toml
//! ```

mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use traffic::{Exercise, ExerciseConfig, IdentityMap, TemplatePool};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exercise configuration (TOML)
    #[arg(long)]
    config: PathBuf,

    /// Template file, one message template per line
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Existing participant id map (JSON object id → name) to keep ids stable
    #[arg(long)]
    ids: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Write the exercise JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Log per-participant statistics after generation
    #[arg(long, default_value_t = false)]
    stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ExerciseConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    config.apply_env_overrides();
    config.validate().context("Exercise config rejected")?;

    let mut pool = config.inline_templates();
    if let Some(path) = &args.templates {
        pool.extend(TemplatePool::from_file(path).context("Failed to load templates")?);
    }

    let existing_ids = match &args.ids {
        Some(path) => Some(load_ids(path)?),
        None => None,
    };

    info!(
        exercise = %config.name,
        participants = config.participants.len(),
        templates = pool.len(),
        seed = ?args.seed,
        "Traffic generator starting"
    );

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let exercise = Exercise::generate(&config, &pool, existing_ids.as_ref(), &mut rng);

    if args.stats {
        report::log_stats(&exercise);
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&exercise)?
    } else {
        serde_json::to_string(&exercise)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), checksum = %exercise.checksum, "Exercise written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn load_ids(path: &std::path::Path) -> Result<IdentityMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read id map {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse id map JSON")
}
