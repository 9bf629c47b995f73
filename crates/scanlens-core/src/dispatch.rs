//! Provider dispatch: ordered attempts across providers with fallback.
//!
//! The dispatcher walks the eligible providers in priority order, delegating
//! each to the retry engine. It short-circuits on the first success, falls
//! back only when a provider's retry budget is exhausted and the last
//! classification permits it, and surfaces Timeout whenever the overall
//! deadline wins.

use std::sync::Arc;
use std::time::Duration;

use crate::classify::{ErrorCategory, ErrorClassification};
use crate::conditioner::{condition, ConditionProfile, ConditionedImage};
use crate::deadline::Deadline;
use crate::observe::{AttemptObserver, RequestState};
use crate::provider::{ProviderAdapter, ProviderRequest};
use crate::retry::{run_provider, RetryPolicy};
use crate::types::{extract_structured, AnalysisResult, ChatMessage, InferenceRequest, PayloadKind};

/// One configured provider, ready to dispatch against.
pub struct ProviderEntry {
    pub adapter: Box<dyn ProviderAdapter>,
    pub policy: RetryPolicy,
    /// Per-call timeout before deadline clamping
    pub call_timeout: Duration,
    /// Whether a proxied transport exists for this provider's first attempt
    pub proxy_available: bool,
    /// Conditioning profile for image payloads; `None` passes bytes through
    pub profile: Option<ConditionProfile>,
    /// Token ceiling requested from the model
    pub max_tokens: u32,
}

/// Orchestrates the attempt sequence across providers.
pub struct Dispatcher {
    observer: Arc<dyn AttemptObserver>,
}

impl Dispatcher {
    pub fn new(observer: Arc<dyn AttemptObserver>) -> Self {
        Self { observer }
    }

    /// Run the request against `entries` in priority order.
    ///
    /// Returns the first success, or the last classified error once every
    /// eligible provider is exhausted.
    pub async fn dispatch(
        &self,
        entries: &[ProviderEntry],
        request: &InferenceRequest,
        deadline: &Deadline,
    ) -> Result<AnalysisResult, ErrorClassification> {
        self.observer.transition(&RequestState::Pending);

        let ordered = order_providers(entries, request);
        if ordered.is_empty() {
            tracing::warn!("No eligible providers for request");
            self.observer.transition(&RequestState::Failed);
            return Err(ErrorClassification::of(ErrorCategory::ProviderUnavailable));
        }

        let mut total_attempts = 0u32;
        let mut last: Option<ErrorClassification> = None;

        for (position, entry) in ordered.iter().enumerate() {
            if deadline.expired() {
                self.observer.transition(&RequestState::Failed);
                return Err(ErrorClassification::of(ErrorCategory::Timeout));
            }

            let provider_request = match build_provider_request(request, entry) {
                Ok(provider_request) => provider_request,
                Err(classification) => {
                    // Image conditioning failures are local and terminal
                    self.observer.transition(&RequestState::Failed);
                    return Err(classification);
                }
            };

            let run = run_provider(
                entry.adapter.as_ref(),
                &provider_request,
                &entry.policy,
                entry.call_timeout,
                entry.proxy_available,
                deadline,
                self.observer.as_ref(),
            )
            .await;
            total_attempts += run.attempts;

            match run.result {
                Ok(response) => {
                    self.observer.transition(&RequestState::Success);
                    let structured = if request.payload == PayloadKind::ImageAnalysis {
                        extract_structured(&response.text)
                    } else {
                        None
                    };
                    return Ok(AnalysisResult {
                        text: response.text,
                        structured,
                        provider: entry.adapter.name().to_string(),
                        model: response.model,
                        tokens_used: response.tokens_used,
                        attempts: total_attempts,
                    });
                }
                Err(classification) => {
                    // Overall expiry overrides whatever the provider said
                    if deadline.expired() {
                        self.observer.transition(&RequestState::Failed);
                        return Err(ErrorClassification::of(ErrorCategory::Timeout));
                    }
                    if !classification.fallback_eligible {
                        self.observer.transition(&RequestState::Failed);
                        return Err(classification);
                    }
                    if let Some(next) = ordered.get(position + 1) {
                        tracing::info!(
                            from = entry.adapter.name(),
                            to = next.adapter.name(),
                            category = ?classification.category,
                            "Falling back to next provider"
                        );
                        self.observer.transition(&RequestState::FallingBack {
                            next: next.adapter.name().to_string(),
                        });
                    }
                    last = Some(classification);
                }
            }
        }

        self.observer.transition(&RequestState::Failed);
        Err(last.unwrap_or_else(|| ErrorClassification::of(ErrorCategory::Unknown)))
    }
}

/// Order eligible providers: vision-capable before text-only whenever the
/// payload carries an image, otherwise configured order.
fn order_providers<'a>(
    entries: &'a [ProviderEntry],
    request: &InferenceRequest,
) -> Vec<&'a ProviderEntry> {
    if request.image.is_some() {
        let (vision, text): (Vec<_>, Vec<_>) = entries
            .iter()
            .partition(|entry| entry.adapter.vision_capable());
        vision.into_iter().chain(text).collect()
    } else {
        entries.iter().collect()
    }
}

/// Shape the inference request into the uniform provider payload, running
/// image conditioning against this provider's profile.
fn build_provider_request(
    request: &InferenceRequest,
    entry: &ProviderEntry,
) -> Result<ProviderRequest, ErrorClassification> {
    let image = match (&request.image, &entry.profile) {
        (Some(bytes), Some(profile)) => Some(condition_for(bytes, profile)?),
        (Some(bytes), None) => Some(ConditionedImage::passthrough(bytes, "image/jpeg")),
        (None, _) => None,
    };

    let messages = match request.payload {
        PayloadKind::ImageAnalysis => vec![ChatMessage::user(request.recognition.prompt())],
        PayloadKind::Chat | PayloadKind::LocalChat => request.messages.clone(),
    };

    Ok(ProviderRequest {
        messages,
        image,
        model: request.model_hint.clone(),
        max_tokens: entry.max_tokens,
    })
}

fn condition_for(
    bytes: &[u8],
    profile: &ConditionProfile,
) -> Result<ConditionedImage, ErrorClassification> {
    condition(bytes, profile).map_err(|e| {
        tracing::warn!("Image conditioning failed: {e}");
        ErrorClassification::of(ErrorCategory::MalformedRequest)
    })
}
