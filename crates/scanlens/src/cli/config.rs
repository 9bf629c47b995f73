//! The `scanlens config` command: inspect and bootstrap configuration.

use clap::{Args, Subcommand};
use scanlens_core::config::resolve_env_var;
use scanlens_core::Config;
use std::path::PathBuf;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration and credential status
    Show,

    /// Print where the config file is looked up
    Path,

    /// Write a starter config file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,

        /// Write to this path instead of the default location
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show(),
        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
            Ok(())
        }
        ConfigCommand::Init { force, path } => {
            let target = path.unwrap_or_else(Config::default_path);
            init(&target, force)
        }
    }
}

fn show() -> anyhow::Result<()> {
    let config = Config::load()?;
    print!("{}", config.to_toml()?);

    // A cloud provider whose key doesn't resolve is silently skipped at
    // dispatch; make that visible here instead of at the first request.
    for (section, key) in [
        ("providers.openai", config.providers.openai.api_key.as_str()),
        (
            "providers.deepseek",
            config.providers.deepseek.api_key.as_str(),
        ),
    ] {
        if resolve_env_var(key).is_none() {
            eprintln!("note: {section}.api_key ({key}) does not resolve; the provider will be skipped");
        }
    }
    Ok(())
}

fn init(target: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            target.display()
        );
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, Config::default().to_toml()?)?;

    println!("Wrote starter config to {}", target.display());
    println!(
        "API keys default to ${{OPENAI_API_KEY}} and ${{DEEPSEEK_API_KEY}}: \
         export those variables, or replace the references with literal keys."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("config.toml");

        init(&target, false).unwrap();

        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.contains("[providers.openai]"));
        assert!(written.contains("${OPENAI_API_KEY}"));
    }

    #[test]
    fn test_init_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.toml");
        std::fs::write(&target, "# hand-edited\n").unwrap();

        assert!(init(&target, false).is_err());
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "# hand-edited\n"
        );

        init(&target, true).unwrap();
        assert!(std::fs::read_to_string(&target)
            .unwrap()
            .contains("[orchestrator]"));
    }
}
