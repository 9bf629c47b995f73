//! Error classification for provider failures.
//!
//! Raw adapter errors are mapped into a stable taxonomy through a rule table
//! keyed on (HTTP status, message substring, transport kind). Retry and
//! fallback policy hang off the category, so new failure modes are handled by
//! adding table entries — the dispatcher and retry engine never change.

use serde::Serialize;

use crate::error::{ProviderError, TransportKind};

/// Stable failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Network-level failure expected to resolve on retry
    TransientConnection,
    /// Invalid or missing credentials
    Authentication,
    /// Quota, rate limit, or balance exhaustion
    AuthorizationQuota,
    /// The request itself was rejected as invalid
    MalformedRequest,
    /// The provider is up but unable to serve (5xx)
    ProviderUnavailable,
    /// A per-call or overall deadline elapsed
    Timeout,
    /// Anything the table does not recognize
    Unknown,
}

impl ErrorCategory {
    /// Whether the same provider may be retried after this failure.
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorCategory::TransientConnection)
    }

    /// Whether the dispatcher may proceed to the next provider.
    pub fn fallback_eligible(&self) -> bool {
        match self {
            ErrorCategory::TransientConnection
            | ErrorCategory::AuthorizationQuota
            | ErrorCategory::ProviderUnavailable
            | ErrorCategory::Timeout
            | ErrorCategory::Unknown => true,
            ErrorCategory::Authentication | ErrorCategory::MalformedRequest => false,
        }
    }

    /// Stable user-facing message for this category.
    ///
    /// Deliberately independent of which provider produced the failure; the
    /// connection/auth/rate-limit hints mirror the messages the original
    /// service surfaced to its mobile client.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::TransientConnection => {
                "无法连接到推理服务。请检查网络连接或代理配置。"
            }
            ErrorCategory::Authentication => "API密钥无效。请检查凭据配置。",
            ErrorCategory::AuthorizationQuota => {
                "请求频率过高或账户额度不足，请稍后重试。"
            }
            ErrorCategory::MalformedRequest => "请求无效，服务无法处理。",
            ErrorCategory::ProviderUnavailable => "推理服务暂时不可用，请稍后重试。",
            ErrorCategory::Timeout => "请求超时。",
            ErrorCategory::Unknown => "推理请求失败。",
        }
    }
}

/// A classified failure: category plus the policy flags and the stable
/// message derived from it.
#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub fallback_eligible: bool,
    pub message: String,
}

impl ErrorClassification {
    /// Build a classification for a category, deriving policy flags.
    pub fn of(category: ErrorCategory) -> Self {
        Self {
            category,
            retryable: category.retryable(),
            fallback_eligible: category.fallback_eligible(),
            message: category.user_message().to_string(),
        }
    }
}

/// One mapping rule. A rule matches when every populated key matches the
/// raw error; the first matching rule in the table wins.
struct Rule {
    status: Option<u16>,
    status_range: Option<(u16, u16)>,
    substring: Option<&'static str>,
    kind: Option<TransportKind>,
    category: ErrorCategory,
}

impl Rule {
    const fn any() -> Self {
        Self {
            status: None,
            status_range: None,
            substring: None,
            kind: None,
            category: ErrorCategory::Unknown,
        }
    }

    fn matches(&self, error: &ProviderError) -> bool {
        if let Some(kind) = self.kind {
            if error.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if error.status != Some(status) {
                return false;
            }
        }
        if let Some((lo, hi)) = self.status_range {
            match error.status {
                Some(code) if code >= lo && code <= hi => {}
                _ => return false,
            }
        }
        if let Some(needle) = self.substring {
            if !error.message.contains(needle) {
                return false;
            }
        }
        true
    }
}

/// The classification table. Transport-kind rules come first (they carry the
/// most signal), then exact statuses, then ranges, then message substrings
/// for providers that fail without an HTTP status.
const RULES: &[Rule] = &[
    Rule {
        kind: Some(TransportKind::TimedOut),
        category: ErrorCategory::Timeout,
        ..Rule::any()
    },
    Rule {
        kind: Some(TransportKind::Connect),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
    Rule {
        status: Some(401),
        category: ErrorCategory::Authentication,
        ..Rule::any()
    },
    Rule {
        status: Some(403),
        category: ErrorCategory::Authentication,
        ..Rule::any()
    },
    // 402 Insufficient Balance (DeepSeek) and 429 rate limit both exhaust
    // the caller's entitlement on this provider, not the request itself.
    Rule {
        status: Some(402),
        category: ErrorCategory::AuthorizationQuota,
        ..Rule::any()
    },
    Rule {
        status: Some(429),
        category: ErrorCategory::AuthorizationQuota,
        ..Rule::any()
    },
    Rule {
        status: Some(408),
        category: ErrorCategory::Timeout,
        ..Rule::any()
    },
    Rule {
        status_range: Some((400, 499)),
        category: ErrorCategory::MalformedRequest,
        ..Rule::any()
    },
    Rule {
        status_range: Some((500, 599)),
        category: ErrorCategory::ProviderUnavailable,
        ..Rule::any()
    },
    Rule {
        substring: Some("ECONNREFUSED"),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
    Rule {
        substring: Some("ETIMEDOUT"),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
    Rule {
        substring: Some("Connection error"),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
    Rule {
        substring: Some("connection refused"),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
    Rule {
        substring: Some("connection reset"),
        category: ErrorCategory::TransientConnection,
        ..Rule::any()
    },
];

/// Classify a raw provider error.
pub fn classify(error: &ProviderError) -> ErrorClassification {
    let category = RULES
        .iter()
        .find(|rule| rule.matches(error))
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::Unknown);
    tracing::debug!(
        category = ?category,
        status = ?error.status,
        kind = ?error.kind,
        "Classified provider error: {}",
        error.message
    );
    ErrorClassification::of(category)
}
