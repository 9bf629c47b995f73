//! Scanlens CLI - inference orchestration for image recognition and chat.
//!
//! Scanlens takes an image (or a chat message) and runs it through the
//! configured AI backends with retry, fallback, and deadline control, then
//! prints the response as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a printer photo
//! scanlens analyze photo.jpg --kind printer
//!
//! # Identify a medicine
//! scanlens analyze box.jpg --kind medicine
//!
//! # Chat against the cloud backends
//! scanlens chat "帮我总结一下A4纸的常见用途"
//!
//! # Chat with the local model server
//! scanlens chat --local "你好" --image photo.jpg
//!
//! # View configuration
//! scanlens config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Scanlens - orchestrated image recognition and chat across AI backends.
#[derive(Parser, Debug)]
#[command(name = "scanlens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze an image with the configured providers
    Analyze(cli::analyze::AnalyzeArgs),

    /// Chat with the cloud backends or the local model server
    Chat(cli::chat::ChatArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match scanlens_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `scanlens config path`."
            );
            scanlens_core::Config::default()
        }
    };
    logging::init(&config.logging, cli.verbose, cli.json_logs);

    tracing::debug!("Scanlens v{}", scanlens_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(config, args).await,
        Commands::Chat(args) => cli::chat::execute(config, args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
