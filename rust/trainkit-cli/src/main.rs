//! trainkit command-line tools
//!
//! Maintains line indexes for text corpora and inspects checkpoint
//! directories.
//!
//! # Usage
//!
//! ```bash
//! # Build (or refresh) the index of a corpus and print its line count
//! trainkit index corpus.jsonl
//!
//! # Print lines 0 and 41
//! trainkit line corpus.jsonl 0 41
//!
//! # Show the best checkpoint of a run
//! trainkit checkpoints select ./checkpoints --mode best
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trainkit_core::checkpoint::{
    shared, ArtifactLayout, CheckpointStore, MetricDirection, RawComponent, SelectMode,
};
use trainkit_core::{IndexedLineReader, LogSink, TrainkitConfig};

/// trainkit corpus and checkpoint tools
#[derive(Parser, Debug)]
#[command(name = "trainkit", version)]
#[command(about = "Line indexes and checkpoint stores for training runs")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build or refresh the line index of a data file
    Index {
        data: PathBuf,

        /// Index file (default: <data>.<reader.index_extension>)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Rebuild even if the index is fresh
        #[arg(long)]
        force: bool,
    },

    /// Print lines by number (0-based)
    Line {
        data: PathBuf,

        #[arg(required = true)]
        numbers: Vec<usize>,
    },

    /// Print the number of lines in a data file
    Count { data: PathBuf },

    /// Inspect a checkpoint directory
    #[command(subcommand)]
    Checkpoints(CheckpointCommand),
}

#[derive(Subcommand, Debug)]
enum CheckpointCommand {
    /// List complete checkpoints, oldest first
    List(StoreArgs),

    /// Print the checkpoint that would be resumed from
    Select {
        #[command(flatten)]
        store: StoreArgs,

        /// latest or best
        #[arg(long, default_value = "latest")]
        mode: SelectMode,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Checkpoint directory
    dir: PathBuf,

    /// directory or flat (overrides checkpoint.layout)
    #[arg(long)]
    layout: Option<ArtifactLayout>,

    /// higher-is-better or lower-is-better (overrides checkpoint.direction)
    #[arg(long)]
    direction: Option<MetricDirection>,

    /// Component every listed checkpoint must contain (repeatable)
    #[arg(long = "component")]
    components: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            TrainkitConfig::from_file(path)?
        }
        None => TrainkitConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;

    match cli.command {
        Command::Index { data, index, force } => {
            let mut reader = IndexedLineReader::open_with_config(
                &data,
                index.as_deref(),
                &config.reader,
                LogSink::current(),
            )?;
            if force {
                reader.reindex()?;
            }
            println!("{}\t{}", reader.len(), reader.index_path().display());
        }
        Command::Line { data, numbers } => {
            let reader =
                IndexedLineReader::open_with_config(&data, None, &config.reader, LogSink::current())?;
            for n in numbers {
                println!("{}", reader.get(n)?);
            }
        }
        Command::Count { data } => {
            let reader =
                IndexedLineReader::open_with_config(&data, None, &config.reader, LogSink::current())?;
            println!("{}", reader.len());
        }
        Command::Checkpoints(CheckpointCommand::List(args)) => {
            let store = open_store(&config, &args)?;
            for artifact in store.list()? {
                println!(
                    "{}\t{:.3}\t{}",
                    artifact.step(),
                    artifact.score(),
                    store.path_of(&artifact).display()
                );
            }
        }
        Command::Checkpoints(CheckpointCommand::Select { store, mode }) => {
            let store = open_store(&config, &store)?;
            let artifact = store.select(mode)?;
            println!(
                "{}\t{:.3}\t{}",
                artifact.step(),
                artifact.score(),
                store.path_of(&artifact).display()
            );
        }
    }

    Ok(())
}

/// Opens `args.dir` read-only with the configured layout and direction,
/// letting command-line flags win.
fn open_store(
    config: &TrainkitConfig,
    args: &StoreArgs,
) -> Result<CheckpointStore, Box<dyn std::error::Error>> {
    let ckpt = &config.checkpoint;
    let direction = args.direction.unwrap_or(ckpt.direction);
    let locator = ckpt.locator_for(args.layout.unwrap_or(ckpt.layout));

    let mut store = CheckpointStore::inspect(&args.dir, direction)?
        .with_locator(locator)
        .with_log_sink(LogSink::current());
    for name in &args.components {
        store.register_component(name.as_str(), shared(RawComponent::default()))?;
    }
    Ok(store)
}
