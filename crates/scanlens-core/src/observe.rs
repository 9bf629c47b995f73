//! Per-attempt observability records.
//!
//! The dispatcher emits one record per attempt to an `AttemptObserver`; the
//! default implementation logs through `tracing`. Collectors in tests (or an
//! external metrics layer) implement the same trait.

use std::time::Duration;

use crate::classify::ErrorClassification;

/// Outcome of one attempt against one provider.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Failure(ErrorClassification),
}

/// One attempt record: provider, 1-based index, latency, outcome.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: String,
    pub index: u32,
    pub latency: Duration,
    pub used_proxy: bool,
    pub outcome: AttemptOutcome,
}

/// Lifecycle of one request through the dispatcher and retry engine.
///
/// `Success` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Attempting { provider: String, attempt: u32 },
    Retrying { provider: String, attempt: u32 },
    FallingBack { next: String },
    Success,
    Failed,
}

/// Sink for attempt records and state transitions.
pub trait AttemptObserver: Send + Sync {
    fn record(&self, attempt: &Attempt);

    /// Called on every request state transition. Default: ignore.
    fn transition(&self, _state: &RequestState) {}
}

/// Default observer: structured logs only.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn record(&self, attempt: &Attempt) {
        match &attempt.outcome {
            AttemptOutcome::Success => {
                tracing::info!(
                    provider = %attempt.provider,
                    attempt = attempt.index,
                    latency_ms = attempt.latency.as_millis() as u64,
                    proxy = attempt.used_proxy,
                    "Attempt succeeded"
                );
            }
            AttemptOutcome::Failure(classification) => {
                tracing::warn!(
                    provider = %attempt.provider,
                    attempt = attempt.index,
                    latency_ms = attempt.latency.as_millis() as u64,
                    proxy = attempt.used_proxy,
                    category = ?classification.category,
                    "Attempt failed"
                );
            }
        }
    }

    fn transition(&self, state: &RequestState) {
        tracing::debug!(state = ?state, "Request state");
    }
}
