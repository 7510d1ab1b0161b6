//! Medicine package verifier CLI - checks images with an ONNX embedding model
//! and a fitted scaler/classifier bundle.
//!
//! Usage:
//!   medverify box.jpg --embedding-model embedding.onnx --bundle bundle.json
//!   medverify a.png b.jpg -e embedding.onnx -b bundle.json --format json
//!   medverify a.png -e embedding.onnx -b bundle.json --config medverify.json

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;

use medverify_core::report::{AnalysisRecord, AnalysisResponse, OutputFormat, print_results};
use medverify_core::{InferencePipeline, ModelBundle, PipelineConfig, load_config};

#[derive(Parser)]
#[command(name = "medverify")]
#[command(about = "Medicine package authenticity checker")]
struct Cli {
    /// Images to check
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to the ONNX embedding model
    #[arg(short, long)]
    embedding_model: PathBuf,

    /// Path to the scaler/classifier bundle (JSON)
    #[arg(short, long)]
    bundle: PathBuf,

    /// Optional pipeline configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Override ONNX Runtime intra-op threads
    #[arg(long)]
    threads: Option<usize>,
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.intra_threads = threads;
    }

    tracing::info!(
        embedding = %cli.embedding_model.display(),
        bundle = %cli.bundle.display(),
        "loading models"
    );
    let bundle = ModelBundle::load(&cli.embedding_model, &cli.bundle, &config)
        .context("failed to load model bundle")?;
    let pipeline = InferencePipeline::from_config(&config, Arc::new(bundle));

    let policy = &config.upload;
    let records: Vec<AnalysisRecord> = cli
        .paths
        .par_iter()
        .map(|path| {
            let response = match policy.check(path) {
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "upload rejected");
                    AnalysisResponse::from_intake_error(&e)
                }
                Ok(()) => AnalysisResponse::from_result(&pipeline.infer(path)),
            };
            AnalysisRecord {
                path: path.clone(),
                response,
            }
        })
        .collect();

    tracing::info!(images = records.len(), "verification finished");
    print_results(&records, cli.format);

    Ok(())
}
