//! Provider adapter contract and shared HTTP transport.
//!
//! Every backend is reached through the same `ProviderAdapter` trait; all
//! provider-specific request/response shaping (field names, headers, auth)
//! lives in the adapter, never in the dispatcher or retry engine.

mod deepseek;
mod ollama;
mod openai;

pub use deepseek::DeepSeekAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use std::time::Duration;

use crate::conditioner::ConditionedImage;
use crate::error::{ConfigError, ProviderError};
use crate::types::ChatMessage;

/// The uniform payload handed to an adapter.
///
/// Image-analysis requests arrive as a single user message (the recognition
/// prompt) plus a conditioned image; chat requests as a message history.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<ChatMessage>,
    pub image: Option<ConditionedImage>,
    /// Per-request model override; adapters fall back to their configured model
    pub model: Option<String>,
    pub max_tokens: u32,
}

/// A successful provider reply. Latency is not measured here; the retry
/// engine times each attempt for its observability record.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated reply text
    pub text: String,
    /// Model identifier that served the request
    pub model: String,
    /// Tokens used (input + output), if the provider reports them
    pub tokens_used: Option<u32>,
}

/// Trait all provider adapters implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the dispatcher holds `Box<dyn ProviderAdapter>`).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logs and attempt records (e.g., "openai").
    fn name(&self) -> &str;

    /// Whether this provider can actually see the image payload.
    fn vision_capable(&self) -> bool;

    /// Issue one call. `timeout` is the already-clamped per-call budget;
    /// `use_proxy` selects the proxied transport for this attempt.
    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
        use_proxy: bool,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// The outbound transport pair: one shared direct client (the process-wide
/// connection pool) and, when a forward proxy is configured, one proxied
/// client. Attempts pick between them via `select`.
#[derive(Debug, Clone)]
pub struct HttpClients {
    direct: reqwest::Client,
    proxied: Option<reqwest::Client>,
}

impl HttpClients {
    /// Build the transport pair around an existing shared direct client.
    pub fn new(direct: reqwest::Client, proxy_url: Option<&str>) -> Result<Self, ConfigError> {
        let proxied = match proxy_url {
            Some(url) => {
                let proxy = reqwest::Proxy::all(url).map_err(|e| {
                    ConfigError::ValidationError(format!("invalid proxy URL '{url}': {e}"))
                })?;
                let client = reqwest::Client::builder().proxy(proxy).build().map_err(|e| {
                    ConfigError::ValidationError(format!("failed to build proxied client: {e}"))
                })?;
                Some(client)
            }
            None => None,
        };
        Ok(Self { direct, proxied })
    }

    /// Transport pair without a proxy.
    pub fn direct_only(direct: reqwest::Client) -> Self {
        Self {
            direct,
            proxied: None,
        }
    }

    /// Pick the client for an attempt. Falls back to the direct client when
    /// a proxy was requested but none is configured.
    pub fn select(&self, use_proxy: bool) -> &reqwest::Client {
        if use_proxy {
            self.proxied.as_ref().unwrap_or(&self.direct)
        } else {
            &self.direct
        }
    }

    /// Whether a proxied transport is available.
    pub fn has_proxy(&self) -> bool {
        self.proxied.is_some()
    }
}
