mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vectorizer::config::VectorizerConfig;

#[derive(Parser)]
#[command(name = "vectorizer", version, about = "Face and image similarity search service")]
struct Cli {
    /// Config file (defaults to ~/.vectorizer/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Manage the CLIP embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Search a scope's images by text prompt
    Search {
        prompt: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        business: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List a scope's images
    Images {
        #[arg(long)]
        event: String,
        #[arg(long)]
        business: String,
    },
    /// Check configuration, model files and datastore reachability
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the CLIP model to ~/.vectorizer/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = match &cli.config {
        Some(path) => VectorizerConfig::load_from(path)?,
        None => VectorizerConfig::load()?,
    };

    // Log to stderr so stdout stays clean for CLI output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            vectorizer::server::serve_http(config).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Search {
            prompt,
            event,
            business,
            top_k,
        } => {
            cli::search::search(&config, &prompt, &event, &business, top_k).await?;
        }
        Command::Images { event, business } => {
            cli::images::images(&config, &event, &business).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config).await?;
        }
    }

    Ok(())
}
