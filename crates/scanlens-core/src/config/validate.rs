//! Configuration validation with range checks.

use crate::conditioner::ConditionProfile;
use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.overall_deadline_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.overall_deadline_secs must be > 0".into(),
            ));
        }
        if self.orchestrator.backoff_unit_ms == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.backoff_unit_ms must be > 0".into(),
            ));
        }
        if self.orchestrator.max_upload_mb == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_upload_mb must be > 0".into(),
            ));
        }
        if self.providers.openai.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "providers.openai.max_attempts must be > 0".into(),
            ));
        }
        if self.providers.openai.max_attempts_with_proxy == 0 {
            return Err(ConfigError::ValidationError(
                "providers.openai.max_attempts_with_proxy must be > 0".into(),
            ));
        }
        if self.providers.deepseek.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "providers.deepseek.max_attempts must be > 0".into(),
            ));
        }
        if self.providers.ollama.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "providers.ollama.max_attempts must be > 0".into(),
            ));
        }
        for (name, timeout) in [
            ("openai", self.providers.openai.timeout_secs),
            ("deepseek", self.providers.deepseek.timeout_secs),
            ("ollama", self.providers.ollama.timeout_secs),
        ] {
            if timeout == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.timeout_secs must be > 0"
                )));
            }
        }
        validate_profile("conditioning.vision", &self.conditioning.vision)?;
        validate_profile("conditioning.text", &self.conditioning.text)?;
        Ok(())
    }
}

fn validate_profile(section: &str, profile: &ConditionProfile) -> Result<(), ConfigError> {
    if profile.max_dimension == 0 || profile.retry_dimension == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{section}: dimensions must be > 0"
        )));
    }
    if profile.retry_dimension > profile.max_dimension {
        return Err(ConfigError::ValidationError(format!(
            "{section}: retry_dimension must not exceed max_dimension"
        )));
    }
    for (field, quality) in [
        ("quality", profile.quality),
        ("retry_quality", profile.retry_quality),
    ] {
        if quality == 0 || quality > 100 {
            return Err(ConfigError::ValidationError(format!(
                "{section}.{field} must be between 1 and 100"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_deadline() {
        let mut config = Config::default();
        config.orchestrator.overall_deadline_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overall_deadline_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_max_attempts() {
        let mut config = Config::default();
        config.providers.openai.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("openai.max_attempts"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.providers.ollama.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ollama.timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut config = Config::default();
        config.conditioning.vision.quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.conditioning.text.retry_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_retry_dimension_above_max() {
        let mut config = Config::default();
        config.conditioning.text.retry_dimension = config.conditioning.text.max_dimension + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_dimension"));
    }
}
