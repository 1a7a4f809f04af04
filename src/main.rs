mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use mr_storage_initializer::{Config, ModelRegistryDownloader};
use std::process::ExitCode;

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(
        "Initializing, args: src_uri [{}] dest_path [{:?}]",
        cli.src_uri,
        cli.dest_path
    );

    let config = Config::from_env().context("Error reading model registry configuration")?;
    let downloader = ModelRegistryDownloader::from_config(&config)
        .await
        .context("Error initializing model registry downloader")?;

    let resolution = downloader
        .download(&cli.dest_path, &cli.model_name, &cli.src_uri)
        .await
        .with_context(|| format!("Error downloading {}", cli.src_uri))?;

    println!("✓ Downloaded model: {}", resolution.model_name());
    println!("  Artifact: {}", resolution.storage_uri());
    println!("  Path: {:?}", cli.dest_path.join(resolution.model_name()));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
