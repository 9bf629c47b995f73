//! The `scanlens analyze` command for one-shot image analysis.

use clap::Args;
use scanlens_core::{Config, Orchestrator, RecognitionKind};
use std::path::PathBuf;

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the image file
    pub image: PathBuf,

    /// What to recognize in the image
    #[arg(long, value_enum, default_value = "printer")]
    pub kind: Kind,

    /// Override the configured model for this request
    #[arg(long)]
    pub model: Option<String>,
}

/// CLI-facing recognition kinds.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Kind {
    Printer,
    Medicine,
    General,
}

impl From<Kind> for RecognitionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Printer => RecognitionKind::Printer,
            Kind::Medicine => RecognitionKind::Medicine,
            Kind::General => RecognitionKind::General,
        }
    }
}

/// Execute the analyze command.
pub async fn execute(config: Config, args: AnalyzeArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.image).await.map_err(|e| {
        anyhow::anyhow!("Failed to read image {}: {e}", args.image.display())
    })?;

    let orchestrator = Orchestrator::new(config)?;
    let response = orchestrator
        .analyze_image(bytes, args.kind.into(), args.model)
        .await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
