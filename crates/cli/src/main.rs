//! Draftline CLI, the main entry point.
//!
//! Commands:
//! - `timeline`   Build or resume a document's authorship timeline
//! - `job`        Show a stored timeline job
//! - `providers`  List completion providers
//! - `status`     Show the effective configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "draftline",
    about = "Draftline: authorship timelines for evolving documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or resume the timeline for one document
    Timeline(TimelineArgs),

    /// Show a stored timeline job
    Job {
        /// Job id printed by `draftline timeline`
        id: String,
    },

    /// List completion providers
    Providers,

    /// Show the effective configuration
    Status,
}

#[derive(Args)]
pub struct TimelineArgs {
    /// Owner of the document
    #[arg(short, long)]
    pub user: String,

    /// Document id within the export
    #[arg(short, long)]
    pub document: String,

    /// JSON export with `snapshots` and `externalRevisions`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Resume or name a job (defaults to a fresh UUID)
    #[arg(short, long)]
    pub job: Option<String>,

    /// Override the configured provider
    #[arg(long, env = "DRAFTLINE_PROVIDER")]
    pub provider: Option<String>,

    /// Override the configured model
    #[arg(long, env = "DRAFTLINE_MODEL")]
    pub model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Timeline(args) => commands::timeline::run(args).await?,
        Commands::Job { id } => commands::job::run(&id).await?,
        Commands::Providers => commands::providers::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
