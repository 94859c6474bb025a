use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use propdoc::{
    CleanPage, DocumentPipeline, HybridClassifier, PropdocConfig, TrainMode,
};

/// Property-document understanding: classify, extract, match.
#[derive(Parser)]
#[command(name = "propdoc", version, about)]
struct Cli {
    /// Pipeline configuration file (YAML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a document given as a JSON array of cleaned pages.
    Process {
        /// JSON file: `[{"page_index": 0, "cleaned_text": "...", "confidence": 0.97}, ...]`
        #[arg(short, long)]
        pages: PathBuf,

        /// Override the configured registry CSV.
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Retrain the classifier model from the accumulated sample pool.
    Train {
        /// Reuse the existing feature transform and refit the classifier only.
        #[arg(long)]
        incremental: bool,
    },

    /// Record an operator-verified document type.
    Verify {
        #[arg(short, long)]
        pages: PathBuf,

        /// The correct document type.
        #[arg(short, long)]
        label: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PropdocConfig::from_file(path)?,
        None => PropdocConfig::default(),
    };

    match cli.command {
        Command::Process { pages, registry } => {
            let mut config = config;
            if let Some(path) = registry {
                config.matcher.registry_path = Some(path);
            }
            let mut pipeline = DocumentPipeline::from_config(&config)?;
            let pages = load_pages(&pages)?;
            let report = pipeline.process_pages(&pages)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Train { incremental } => {
            let mut classifier = HybridClassifier::open(config.classify);
            let mode = if incremental {
                TrainMode::Incremental
            } else {
                TrainMode::Full
            };
            let report = classifier.train_model(mode)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Verify { pages, label } => {
            let mut classifier = HybridClassifier::open(config.classify);
            let pages = load_pages(&pages)?;
            let texts: Vec<&str> = pages.iter().map(|p| p.cleaned_text.as_str()).collect();
            let result = classifier.classify_verified(&texts.join(" "), &label);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn load_pages(path: &PathBuf) -> Result<Vec<CleanPage>, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
