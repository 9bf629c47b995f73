//! The `scanlens chat` command for cloud and local chat.

use clap::Args;
use scanlens_core::{ChatMessage, Config, Orchestrator};
use std::path::PathBuf;

/// Arguments for the `chat` command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The message to send
    pub message: String,

    /// Route to the local model server instead of the cloud backends
    #[arg(long)]
    pub local: bool,

    /// Attach an image (local chat only)
    #[arg(long, requires = "local")]
    pub image: Option<PathBuf>,

    /// Override the configured model for this request
    #[arg(long)]
    pub model: Option<String>,
}

/// Execute the chat command.
pub async fn execute(config: Config, args: ChatArgs) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(config)?;

    let response = if args.local {
        let image = match &args.image {
            Some(path) => Some(tokio::fs::read(path).await.map_err(|e| {
                anyhow::anyhow!("Failed to read image {}: {e}", path.display())
            })?),
            None => None,
        };
        orchestrator
            .local_chat(Some(args.message), image, args.model)
            .await
    } else {
        orchestrator
            .chat(vec![ChatMessage::user(args.message)], args.model)
            .await
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
