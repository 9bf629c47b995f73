//! Bounded retry with linear backoff against a single provider.
//!
//! Retries happen only for failures classified Transient-Connection; any
//! other classification returns control to the dispatcher immediately. The
//! backoff before retry `n` is `n-1` backoff units (2s, 4s, ... with the
//! default unit), raced against the request's overall deadline. Only the
//! first attempt may ride the optional forward proxy.

use std::time::{Duration, Instant};

use crate::classify::{classify, ErrorCategory, ErrorClassification};
use crate::deadline::Deadline;
use crate::observe::{Attempt, AttemptObserver, AttemptOutcome, RequestState};
use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse};

/// Per-provider retry parameters, resolved from configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling for this provider (already reduced when a proxy is
    /// configured — that trade-off is an explicit config field, not a branch)
    pub max_attempts: u32,
    /// Fixed backoff unit; retry n waits (n-1) units
    pub backoff_unit: Duration,
}

/// Result of running one provider to success or exhaustion.
#[derive(Debug)]
pub struct ProviderRun {
    pub result: Result<ProviderResponse, ErrorClassification>,
    /// Attempts actually issued against this provider
    pub attempts: u32,
}

impl ProviderRun {
    fn failed(classification: ErrorClassification, attempts: u32) -> Self {
        Self {
            result: Err(classification),
            attempts,
        }
    }
}

/// Execute up to `policy.max_attempts` calls against one provider.
///
/// Attempts are strictly sequential. The deadline is checked before every
/// attempt and every backoff wait; expiry anywhere surfaces Timeout
/// regardless of remaining budget.
pub async fn run_provider(
    adapter: &dyn ProviderAdapter,
    request: &ProviderRequest,
    policy: &RetryPolicy,
    call_timeout: Duration,
    proxy_available: bool,
    deadline: &Deadline,
    observer: &dyn AttemptObserver,
) -> ProviderRun {
    let mut last = ErrorClassification::of(ErrorCategory::Unknown);

    for attempt in 1..=policy.max_attempts {
        if attempt == 1 {
            observer.transition(&RequestState::Attempting {
                provider: adapter.name().to_string(),
                attempt,
            });
        } else {
            observer.transition(&RequestState::Retrying {
                provider: adapter.name().to_string(),
                attempt,
            });
            let wait = policy.backoff_unit * (attempt - 1);
            tracing::debug!(
                provider = adapter.name(),
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Backing off before retry"
            );
            if !deadline.sleep(wait).await {
                return ProviderRun::failed(
                    ErrorClassification::of(ErrorCategory::Timeout),
                    attempt - 1,
                );
            }
        }

        // Clamp the per-call budget to what the request has left
        let budget = match deadline.clamp(call_timeout) {
            Some(budget) if !budget.is_zero() => budget,
            _ => {
                return ProviderRun::failed(
                    ErrorClassification::of(ErrorCategory::Timeout),
                    attempt - 1,
                )
            }
        };

        let use_proxy = attempt == 1 && proxy_available;
        let start = Instant::now();

        let outcome = tokio::select! {
            _ = deadline.cancelled() => None,
            result = tokio::time::timeout(budget, adapter.invoke(request, budget, use_proxy)) => {
                Some(result)
            }
        };

        let record = |outcome: AttemptOutcome| Attempt {
            provider: adapter.name().to_string(),
            index: attempt,
            latency: start.elapsed(),
            used_proxy: use_proxy,
            outcome,
        };

        match outcome {
            // External cancellation: the in-flight call future is dropped,
            // which aborts the connection
            None => {
                let classification = ErrorClassification::of(ErrorCategory::Timeout);
                observer.record(&record(AttemptOutcome::Failure(classification.clone())));
                return ProviderRun::failed(classification, attempt);
            }
            // Per-call budget elapsed
            Some(Err(_)) => {
                let classification = ErrorClassification::of(ErrorCategory::Timeout);
                observer.record(&record(AttemptOutcome::Failure(classification.clone())));
                return ProviderRun::failed(classification, attempt);
            }
            Some(Ok(Ok(response))) => {
                observer.record(&record(AttemptOutcome::Success));
                return ProviderRun {
                    result: Ok(response),
                    attempts: attempt,
                };
            }
            Some(Ok(Err(raw))) => {
                let classification = classify(&raw);
                observer.record(&record(AttemptOutcome::Failure(classification.clone())));
                if !classification.retryable {
                    return ProviderRun::failed(classification, attempt);
                }
                last = classification;
            }
        }
    }

    ProviderRun::failed(last, policy.max_attempts)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{ProviderError, TransportKind};
    use crate::types::ChatMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// A scripted mock adapter: each call pops the next result from the
    /// script; once the script is exhausted it keeps returning the last one.
    pub(crate) struct MockAdapter {
        pub name: &'static str,
        pub vision: bool,
        script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
        pub calls: AtomicU32,
        pub proxy_flags: Mutex<Vec<bool>>,
        pub delay: Option<Duration>,
    }

    impl MockAdapter {
        pub fn new(
            name: &'static str,
            script: Vec<Result<ProviderResponse, ProviderError>>,
        ) -> Self {
            Self {
                name,
                vision: true,
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
                proxy_flags: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub fn response(text: &str) -> ProviderResponse {
            ProviderResponse {
                text: text.to_string(),
                model: "mock-v1".to_string(),
                tokens_used: Some(42),
            }
        }

        pub fn connect_error() -> ProviderError {
            ProviderError {
                message: "error trying to connect: ECONNREFUSED".to_string(),
                status: None,
                kind: TransportKind::Connect,
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn vision_capable(&self) -> bool {
            self.vision
        }

        async fn invoke(
            &self,
            _request: &ProviderRequest,
            _timeout: Duration,
            use_proxy: bool,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.proxy_flags.lock().unwrap().push(use_proxy);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err(ProviderError::bad_body("script exhausted")))
            }
        }
    }

    /// Observer that collects records for assertions.
    #[derive(Default)]
    pub(crate) struct CollectingObserver {
        pub attempts: Mutex<Vec<Attempt>>,
    }

    impl AttemptObserver for CollectingObserver {
        fn record(&self, attempt: &Attempt) {
            self.attempts.lock().unwrap().push(attempt.clone());
        }
    }

    pub(crate) fn chat_request() -> ProviderRequest {
        ProviderRequest {
            messages: vec![ChatMessage::user("hello")],
            image: None,
            model: None,
            max_tokens: 100,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_unit: Duration::from_millis(10),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transient_failures_then_success() {
        // Two connection failures, then success: exactly 2 retries
        let adapter = MockAdapter::new(
            "cloud",
            vec![
                Err(MockAdapter::connect_error()),
                Err(MockAdapter::connect_error()),
                Ok(MockAdapter::response("recovered")),
            ],
        );
        let observer = CollectingObserver::default();
        let deadline = Deadline::new(Duration::from_secs(10));

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(3),
            Duration::from_secs(5),
            false,
            &deadline,
            &observer,
        )
        .await;

        assert_eq!(run.attempts, 3);
        assert_eq!(run.result.unwrap().text, "recovered");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(observer.attempts.lock().unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exhaustion_returns_last_classification() {
        let adapter = MockAdapter::new("cloud", vec![Err(MockAdapter::connect_error())]);
        let deadline = Deadline::new(Duration::from_secs(10));
        let observer = CollectingObserver::default();

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(3),
            Duration::from_secs(5),
            false,
            &deadline,
            &observer,
        )
        .await;

        assert_eq!(run.attempts, 3);
        let classification = run.result.unwrap_err();
        assert_eq!(classification.category, ErrorCategory::TransientConnection);
        assert!(classification.fallback_eligible);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_terminal_classification_stops_after_one_attempt() {
        let adapter = MockAdapter::new(
            "cloud",
            vec![Err(ProviderError::http_status("cloud", 400, "bad request"))],
        );
        let deadline = Deadline::new(Duration::from_secs(10));
        let observer = CollectingObserver::default();

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(3),
            Duration::from_secs(5),
            false,
            &deadline,
            &observer,
        )
        .await;

        assert_eq!(run.attempts, 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        let classification = run.result.unwrap_err();
        assert_eq!(classification.category, ErrorCategory::MalformedRequest);
        assert!(!classification.fallback_eligible);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_only_first_attempt_uses_proxy() {
        let adapter = MockAdapter::new(
            "cloud",
            vec![
                Err(MockAdapter::connect_error()),
                Ok(MockAdapter::response("direct worked")),
            ],
        );
        let deadline = Deadline::new(Duration::from_secs(10));
        let observer = CollectingObserver::default();

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(2),
            Duration::from_secs(5),
            true,
            &deadline,
            &observer,
        )
        .await;

        assert!(run.result.is_ok());
        let flags = adapter.proxy_flags.lock().unwrap().clone();
        assert_eq!(flags, vec![true, false]);

        let records = observer.attempts.lock().unwrap();
        assert!(records[0].used_proxy);
        assert!(!records[1].used_proxy);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deadline_expiry_during_backoff() {
        let adapter = MockAdapter::new("cloud", vec![Err(MockAdapter::connect_error())]);
        // Deadline shorter than the first backoff wait
        let deadline = Deadline::new(Duration::from_millis(40));
        let observer = CollectingObserver::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(2),
        };

        let run = run_provider(
            &adapter,
            &chat_request(),
            &policy,
            Duration::from_secs(5),
            false,
            &deadline,
            &observer,
        )
        .await;

        // Only the first attempt was issued; the backoff wait was abandoned
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.result.unwrap_err().category, ErrorCategory::Timeout);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_per_call_timeout_classified_timeout() {
        let mut adapter = MockAdapter::new("slow", vec![Ok(MockAdapter::response("too late"))]);
        adapter.delay = Some(Duration::from_secs(5));
        let deadline = Deadline::new(Duration::from_secs(10));
        let observer = CollectingObserver::default();

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(3),
            Duration::from_millis(30),
            false,
            &deadline,
            &observer,
        )
        .await;

        assert_eq!(run.attempts, 1);
        let classification = run.result.unwrap_err();
        assert_eq!(classification.category, ErrorCategory::Timeout);
        assert!(classification.fallback_eligible);
        // Timeout is not retryable within the provider
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_external_cancellation_aborts_call() {
        let mut adapter = MockAdapter::new("slow", vec![Ok(MockAdapter::response("never"))]);
        adapter.delay = Some(Duration::from_secs(30));
        let deadline = Deadline::new(Duration::from_secs(60));
        let observer = CollectingObserver::default();

        let cancel = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let run = run_provider(
            &adapter,
            &chat_request(),
            &fast_policy(1),
            Duration::from_secs(50),
            false,
            &deadline,
            &observer,
        )
        .await;

        assert_eq!(run.result.unwrap_err().category, ErrorCategory::Timeout);
    }
}
