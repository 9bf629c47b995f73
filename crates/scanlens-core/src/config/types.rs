//! Sub-configuration structs with defaults matching the deployed service.

use serde::{Deserialize, Serialize};

use crate::conditioner::ConditionProfile;

/// Orchestrator-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Overall wall-clock budget per request, shared across every attempt.
    /// Sized for local-model inference, which can take tens of minutes.
    pub overall_deadline_secs: u64,

    /// Fixed backoff unit; retry n waits (n-1) units
    pub backoff_unit_ms: u64,

    /// Upload size ceiling for image payloads
    pub max_upload_mb: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            overall_deadline_secs: 2100,
            backoff_unit_ms: 2000,
            max_upload_mb: 10,
        }
    }
}

/// Minimum severity of emitted log events.
///
/// Ordered most-verbose first, so `min` between two levels picks the
/// chattier one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive form understood by the tracing env filter.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log event encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored, for a terminal
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

/// Logging settings. Invalid level or format strings are rejected when the
/// config file is parsed, not at logging init.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,

    pub format: LogFormat,
}

/// OpenAI provider settings — the primary vision-capable backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key, or a `${ENV_VAR}` reference
    pub api_key: String,

    /// Chat Completions endpoint
    pub endpoint: String,

    /// Default model; per-request hints override it
    pub model: String,

    /// Optional forward proxy for the first attempt
    pub proxy_url: Option<String>,

    /// Attempt ceiling without a proxy
    pub max_attempts: u32,

    /// Attempt ceiling when a proxy is configured. The deployed service ran
    /// fewer attempts through the proxy; kept as explicit policy rather than
    /// a hidden branch.
    pub max_attempts_with_proxy: u32,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Token ceiling requested from the model
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            proxy_url: None,
            max_attempts: 3,
            max_attempts_with_proxy: 2,
            timeout_secs: 60,
            max_tokens: 1000,
        }
    }
}

/// DeepSeek provider settings — the text-only fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSeekConfig {
    /// API key, or a `${ENV_VAR}` reference
    pub api_key: String,

    /// API base URL (the `/chat/completions` path is appended)
    pub base_url: String,

    pub model: String,

    pub max_attempts: u32,

    pub timeout_secs: u64,

    pub max_tokens: u32,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: "${DEEPSEEK_API_KEY}".to_string(),
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            max_attempts: 1,
            timeout_secs: 60,
            max_tokens: 2000,
        }
    }
}

/// Ollama provider settings — the locally hosted model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,

    pub endpoint: String,

    pub model: String,

    pub max_attempts: u32,

    /// Per-call timeout in seconds; local inference can take tens of minutes
    pub timeout_secs: u64,

    pub max_tokens: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "gemma3".to_string(),
            max_attempts: 1,
            timeout_secs: 1800,
            max_tokens: 1000,
        }
    }
}

/// Provider settings, one section per backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: OpenAiConfig,
    pub deepseek: DeepSeekConfig,
    pub ollama: OllamaConfig,
}

/// Image conditioning profiles per backend class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    /// Profile for vision-capable backends
    pub vision: ConditionProfile,

    /// Profile for text-only backends that receive the image inline
    pub text: ConditionProfile,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            vision: ConditionProfile::default(),
            text: ConditionProfile::text_inline(),
        }
    }
}
