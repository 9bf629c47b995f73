//! Configuration management for Scanlens.
//!
//! Configuration is loaded from a TOML file once at startup and is immutable
//! thereafter. All config structs implement `Default` with the values the
//! deployed service ran with.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Scanlens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator-wide settings
    pub orchestrator: OrchestratorConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Provider settings
    pub providers: ProvidersConfig,

    /// Image conditioning profiles
    pub conditioning: ConditioningConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// ~/.scanlens/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "scanlens", "scanlens")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                let expanded = shellexpand::tilde(&home);
                PathBuf::from(expanded.into_owned())
                    .join(".scanlens")
                    .join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
///
/// Returns `None` for empty values and for unset environment variables, so
/// callers can treat "no credential" and "unresolvable credential" the same
/// way: the provider is excluded from dispatch.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.orchestrator.backoff_unit_ms, 2000);
        assert_eq!(config.providers.openai.max_attempts, 3);
        assert_eq!(config.providers.openai.max_attempts_with_proxy, 2);
        assert_eq!(config.providers.deepseek.model, "deepseek-chat");
        assert_eq!(config.providers.ollama.timeout_secs, 1800);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[orchestrator]"));
        assert!(toml.contains("[providers.openai]"));
        assert!(toml.contains("[conditioning.text]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
overall_deadline_secs = 120

[providers.openai]
model = "gpt-4o-mini"
proxy_url = "http://127.0.0.1:7890"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.orchestrator.overall_deadline_secs, 120);
        assert_eq!(config.providers.openai.model, "gpt-4o-mini");
        assert_eq!(
            config.providers.openai.proxy_url.as_deref(),
            Some("http://127.0.0.1:7890")
        );
        // Untouched sections keep their defaults
        assert_eq!(config.providers.deepseek.max_tokens, 2000);
    }

    #[test]
    fn test_logging_settings_parse_as_enums() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_log_level_rejected_at_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }
}
