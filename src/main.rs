//! imsim - build an image similarity index and query it from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use imsim::{ImsimConfig, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "imsim", version, about = "Image similarity search")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every image in the data directory and save the index
    Build(BuildArgs),
    /// Find the stored images most similar to a query image
    Search(SearchArgs),
    /// Show row counts and dimension of the saved index
    Info,
}

#[derive(Args)]
struct BuildArgs {
    /// Directory of images to index (overrides `data_dir`)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Query image
    image: PathBuf,
    /// Number of matches to return (overrides `search.top_k`)
    #[arg(short, long)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct MatchLine {
    rank: usize,
    file_name: String,
    path: PathBuf,
    score: f32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ImsimConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Build(args) => {
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }
            let embedder = imsim::load_embedder(&config)?;
            let report = imsim::build_and_save(&config, &embedder)
                .with_context(|| format!("building index from {}", config.data_dir.display()))?;
            print_json(&report)?;
        }
        Commands::Search(args) => {
            let top_k = args.k.unwrap_or(config.search.top_k);
            let embedder = imsim::load_embedder(&config)?;
            let engine = imsim::open_engine(&config, &embedder)
                .with_context(|| format!("opening index in {}", config.artifacts.dir.display()))?;
            let hits = engine
                .search_file(&args.image, top_k)
                .with_context(|| format!("searching with {}", args.image.display()))?;
            let lines: Vec<MatchLine> = hits
                .into_iter()
                .map(|hit| MatchLine {
                    rank: hit.rank,
                    file_name: hit
                        .path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: hit.path,
                    score: hit.score,
                })
                .collect();
            print_json(&lines)?;
        }
        Commands::Info => {
            let summary = imsim::inspect_artifacts(&config)
                .with_context(|| format!("inspecting {}", config.artifacts.dir.display()))?;
            if !summary.is_consistent() {
                tracing::warn!(?summary, "saved artifacts disagree on row count");
            }
            print_json(&summary)?;
        }
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so stdout
/// stays parseable JSON.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
