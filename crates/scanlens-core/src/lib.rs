//! Scanlens Core - Inference-request orchestration library.
//!
//! Scanlens mediates between a caller's request (an image to analyze, or a
//! chat message) and several heterogeneous AI backends: a cloud vision/chat
//! service, a text-only chat fallback, and a locally hosted model server.
//!
//! # Architecture
//!
//! ```text
//! Request → Condition image → Dispatch providers in order
//!         → per provider: retry with backoff through the proxy switch
//!         → classify each failure → retry, fall back, or terminate
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use scanlens_core::{Config, Orchestrator, RecognitionKind};
//!
//! #[tokio::main]
//! async fn main() -> scanlens_core::Result<()> {
//!     let config = Config::load()?;
//!     let orchestrator = Orchestrator::new(config)?;
//!
//!     let bytes = std::fs::read("./printer.jpg")?;
//!     let response = orchestrator
//!         .analyze_image(bytes, RecognitionKind::Printer, None)
//!         .await;
//!     println!("{:?}", response.result_text);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod classify;
pub mod conditioner;
pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod observe;
pub mod provider;
pub mod retry;
pub mod types;

// Re-exports for convenient access
pub use classify::{classify, ErrorCategory, ErrorClassification};
pub use conditioner::{condition, ConditionProfile, ConditionedImage};
pub use config::Config;
pub use deadline::Deadline;
pub use dispatch::{Dispatcher, ProviderEntry};
pub use error::{ConfigError, ImageError, ProviderError, Result, ScanError};
pub use observe::{Attempt, AttemptObserver, RequestState, TracingObserver};
pub use provider::{HttpClients, ProviderAdapter, ProviderRequest, ProviderResponse};
pub use retry::RetryPolicy;
pub use types::{
    AnalysisResult, ChatMessage, InferenceRequest, InferenceResponse, PayloadKind,
    RecognitionKind,
};

use std::sync::Arc;
use std::time::Duration;

use config::resolve_env_var;
use provider::{DeepSeekAdapter, OllamaAdapter, OpenAiAdapter};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The orchestrator - main entry point for inference requests.
///
/// Built once at startup: provider adapters, the shared outbound connection
/// pool, and the optional proxied transport are all constructed here and
/// immutable afterwards. Requests are handled independently; the orchestrator
/// is cheap to share behind an `Arc`.
pub struct Orchestrator {
    config: Config,
    dispatcher: Dispatcher,
    /// Cloud providers in priority order (image analysis and chat)
    cloud: Vec<ProviderEntry>,
    /// The pinned local provider (local-chat payloads)
    local: Vec<ProviderEntry>,
}

impl Orchestrator {
    /// Create an orchestrator with the default tracing observer.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create an orchestrator with a custom attempt observer.
    pub fn with_observer(config: Config, observer: Arc<dyn AttemptObserver>) -> Result<Self> {
        tracing::debug!("Initializing Scanlens v{}", VERSION);

        // One direct client, shared by every adapter: the outbound pool
        let direct = reqwest::Client::new();
        let backoff_unit = Duration::from_millis(config.orchestrator.backoff_unit_ms);

        let mut cloud = Vec::new();

        let openai = &config.providers.openai;
        match resolve_env_var(&openai.api_key) {
            Some(api_key) => {
                let proxy_url = openai
                    .proxy_url
                    .as_deref()
                    .and_then(resolve_env_var);
                let clients = HttpClients::new(direct.clone(), proxy_url.as_deref())
                    .map_err(ScanError::Config)?;
                let proxy_available = clients.has_proxy();
                cloud.push(ProviderEntry {
                    adapter: Box::new(OpenAiAdapter::new(
                        clients,
                        &api_key,
                        &openai.model,
                        &openai.endpoint,
                    )),
                    policy: RetryPolicy {
                        max_attempts: if proxy_available {
                            openai.max_attempts_with_proxy
                        } else {
                            openai.max_attempts
                        },
                        backoff_unit,
                    },
                    call_timeout: Duration::from_secs(openai.timeout_secs),
                    proxy_available,
                    profile: Some(config.conditioning.vision.clone()),
                    max_tokens: openai.max_tokens,
                });
            }
            None => tracing::info!("OpenAI credentials not set — provider excluded"),
        }

        let deepseek = &config.providers.deepseek;
        match resolve_env_var(&deepseek.api_key) {
            Some(api_key) => {
                cloud.push(ProviderEntry {
                    adapter: Box::new(DeepSeekAdapter::new(
                        HttpClients::direct_only(direct.clone()),
                        &api_key,
                        &deepseek.model,
                        &deepseek.base_url,
                    )),
                    policy: RetryPolicy {
                        max_attempts: deepseek.max_attempts,
                        backoff_unit,
                    },
                    call_timeout: Duration::from_secs(deepseek.timeout_secs),
                    proxy_available: false,
                    profile: Some(config.conditioning.text.clone()),
                    max_tokens: deepseek.max_tokens,
                });
            }
            None => tracing::info!("DeepSeek credentials not set — provider excluded"),
        }

        let mut local = Vec::new();
        let ollama = &config.providers.ollama;
        if ollama.enabled {
            local.push(ProviderEntry {
                adapter: Box::new(OllamaAdapter::new(
                    HttpClients::direct_only(direct),
                    &ollama.endpoint,
                    &ollama.model,
                )),
                policy: RetryPolicy {
                    max_attempts: ollama.max_attempts,
                    backoff_unit,
                },
                call_timeout: Duration::from_secs(ollama.timeout_secs),
                proxy_available: false,
                profile: None,
                max_tokens: ollama.max_tokens,
            });
        }

        Ok(Self {
            config,
            dispatcher: Dispatcher::new(observer),
            cloud,
            local,
        })
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze an image with the cloud providers (vision first).
    pub async fn analyze_image(
        &self,
        bytes: Vec<u8>,
        recognition: RecognitionKind,
        model_hint: Option<String>,
    ) -> InferenceResponse {
        if let Err(e) =
            conditioner::check_upload_size(&bytes, self.config.orchestrator.max_upload_mb)
        {
            tracing::warn!("Rejected oversized upload: {e}");
            return InferenceResponse::error(ErrorClassification::of(
                ErrorCategory::MalformedRequest,
            ));
        }
        let request = InferenceRequest {
            payload: PayloadKind::ImageAnalysis,
            recognition,
            image: Some(bytes),
            messages: vec![],
            model_hint,
            overall_budget: self.overall_budget(),
        };
        let deadline = Deadline::new(request.overall_budget);
        self.execute(&request, &deadline).await
    }

    /// Run a chat conversation against the cloud providers.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model_hint: Option<String>,
    ) -> InferenceResponse {
        if messages.is_empty() {
            return InferenceResponse::error(ErrorClassification::of(
                ErrorCategory::MalformedRequest,
            ));
        }
        let request = InferenceRequest {
            payload: PayloadKind::Chat,
            recognition: RecognitionKind::General,
            image: None,
            messages,
            model_hint,
            overall_budget: self.overall_budget(),
        };
        let deadline = Deadline::new(request.overall_budget);
        self.execute(&request, &deadline).await
    }

    /// Chat with the local model server, optionally attaching an image.
    pub async fn local_chat(
        &self,
        message: Option<String>,
        image: Option<Vec<u8>>,
        model_hint: Option<String>,
    ) -> InferenceResponse {
        if message.is_none() && image.is_none() {
            return InferenceResponse::error(ErrorClassification::of(
                ErrorCategory::MalformedRequest,
            ));
        }
        let content = message.unwrap_or_else(|| RecognitionKind::General.prompt().to_string());
        let request = InferenceRequest {
            payload: PayloadKind::LocalChat,
            recognition: RecognitionKind::General,
            image,
            messages: vec![ChatMessage::user(content)],
            model_hint,
            overall_budget: self.overall_budget(),
        };
        let deadline = Deadline::new(request.overall_budget);
        self.execute(&request, &deadline).await
    }

    /// Run a prepared request against the provider set for its payload kind.
    ///
    /// The caller owns the deadline, so an upstream collaborator can cancel
    /// it on client disconnect.
    pub async fn execute(
        &self,
        request: &InferenceRequest,
        deadline: &Deadline,
    ) -> InferenceResponse {
        let entries = match request.payload {
            PayloadKind::LocalChat => &self.local,
            PayloadKind::ImageAnalysis | PayloadKind::Chat => &self.cloud,
        };
        match self.dispatcher.dispatch(entries, request, deadline).await {
            Ok(result) => InferenceResponse::success(result),
            Err(classification) => InferenceResponse::error(classification),
        }
    }

    fn overall_budget(&self) -> Duration {
        Duration::from_secs(self.config.orchestrator.overall_deadline_secs)
    }
}
