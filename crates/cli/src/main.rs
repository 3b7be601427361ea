//! `studio` command-line driver.
//!
//! Runs the ingestion pipeline, the preview registry and the size-chart
//! reader against the configured HTTP inference backend.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studio_core::config::loader::load_config;
use studio_core::inference::HttpInferenceClient;
use studio_core::ingest::SourceImage;
use studio_core::preview::PromptTable;
use studio_core::Studio;
use studio_protocol::ingestion_models::IngestionStage;
use studio_protocol::ipc::Event;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PROMPT: &str = "A model wearing the garment, full body, studio lighting";

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Garment ingestion and preview generation")]
#[command(version)]
struct Cli {
    /// Project directory containing `.studio/config.toml`
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a clean garment image from a photograph
    Ingest {
        /// Photograph to ingest
        photo: PathBuf,

        /// Candidate region to extract if the photo shows several garments
        #[arg(short, long)]
        select: Option<usize>,

        /// Upload slot name
        #[arg(long, default_value = "main")]
        slot: String,
    },

    /// Generate model previews for one or more keys
    Preview {
        /// Preview keys
        #[arg(required = true)]
        keys: Vec<String>,

        /// Garment image sent with every request
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Per-key prompt as `key=text` (repeatable)
        #[arg(short, long = "prompt", value_name = "KEY=TEXT")]
        prompts: Vec<String>,
    },

    /// Read a photographed size chart
    SizeChart {
        /// Photograph of the size chart
        photo: PathBuf,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio=info,studio_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli.root)
        .await
        .wrap_err_with(|| format!("Failed to load config from {}", cli.root.display()))?;
    let client = Arc::new(HttpInferenceClient::new(&config.inference)?);
    tracing::info!(base_url = %client.base_url(), "Using inference backend");

    match cli.command {
        Commands::Ingest { photo, select, slot } => {
            let (studio, events) =
                Studio::new(&config, client, Arc::new(PromptTable::new(DEFAULT_PROMPT)));
            let logger = tokio::spawn(log_events(events));

            run_ingest(&studio, &photo, select, &slot).await?;

            drop(studio);
            let _ = logger.await;
        }
        Commands::Preview {
            keys,
            reference,
            prompts,
        } => {
            let table = build_prompt_table(&prompts)?;
            if let Some(path) = reference {
                let source = read_photo(&path).await?;
                table.set_reference_image(Some(source.image().clone()));
            }

            let (studio, events) = Studio::new(&config, client, Arc::new(table));
            let logger = tokio::spawn(log_events(events));

            for ticket in studio.previews().request_bulk(&keys).await {
                ticket.settled().await;
            }
            let snapshot = studio.previews().snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);

            drop(studio);
            let _ = logger.await;
        }
        Commands::SizeChart { photo } => {
            let (studio, _events) =
                Studio::new(&config, client, Arc::new(PromptTable::new(DEFAULT_PROMPT)));
            let source = read_photo(&photo).await?;

            let chart = studio.slot("size-chart").await.read_size_chart(&source).await?;
            if chart.is_empty() {
                eprintln!("{}", "No size rows found in the photo".yellow());
            }
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
    }

    Ok(())
}

async fn run_ingest(
    studio: &Studio,
    photo: &Path,
    select: Option<usize>,
    slot: &str,
) -> color_eyre::Result<()> {
    let source = read_photo(photo).await?;
    let pipeline = studio.slot(slot).await;

    let mut stage = pipeline.submit_photo(source).await;
    print_stage(&stage);

    if let IngestionStage::Selecting {
        candidate_regions, ..
    } = &stage
    {
        for (i, region) in candidate_regions.iter().enumerate() {
            println!("  [{}] {}", i, region.label);
        }
        match select {
            Some(index) => {
                stage = pipeline.select_region(index).await?;
                print_stage(&stage);
            }
            None => {
                println!("Re-run with --select <n> to extract one of the garments above");
                return Ok(());
            }
        }
    }

    if let IngestionStage::Failed { error_message, .. } = &stage {
        return Err(eyre!("{error_message}"));
    }
    Ok(())
}

async fn read_photo(path: &Path) -> color_eyre::Result<SourceImage> {
    SourceImage::from_path(path)
        .await
        .wrap_err_with(|| format!("Cannot use {} as a photo", path.display()))
}

fn build_prompt_table(pairs: &[String]) -> color_eyre::Result<PromptTable> {
    let mut table = PromptTable::new(DEFAULT_PROMPT);
    for pair in pairs {
        let (key, text) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("prompt must be KEY=TEXT, got: '{pair}'"))?;
        table = table.with_prompt(key.trim(), text.trim());
    }
    Ok(table)
}

fn print_stage(stage: &IngestionStage) {
    let kind = stage.kind().to_string();
    let kind = kind.as_str();
    let label = match stage {
        IngestionStage::Done { .. } => kind.green(),
        IngestionStage::Failed { .. } => kind.red(),
        IngestionStage::Selecting { .. } => kind.yellow(),
        _ => kind.normal(),
    };
    println!("{} {}", "stage:".bold(), label);

    if let Some(url) = stage.result_image_url() {
        println!("{} {} bytes as data URL", "result:".bold(), url.len());
    }
    if let Some(message) = stage.error_message() {
        println!("{} {}", "error:".bold(), message);
    }
}

async fn log_events(mut events: UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        tracing::debug!(?event, "studio event");
    }
}
