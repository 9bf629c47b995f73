//! Core data types shared across the orchestration layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classify::{ErrorCategory, ErrorClassification};

/// What kind of payload an inference request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// An image to analyze with a recognition prompt
    ImageAnalysis,
    /// A plain chat conversation against the cloud backends
    Chat,
    /// A chat (optionally with an image) pinned to the local model server
    LocalChat,
}

/// What the caller wants recognized in an uploaded image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionKind {
    /// Identify a printer model and its paper size
    #[default]
    Printer,
    /// Identify a medicine and summarize its efficacy
    Medicine,
    /// Free-form image analysis
    General,
}

impl RecognitionKind {
    /// The analysis prompt sent to the model for this recognition intent.
    ///
    /// Printer and medicine prompts ask for a JSON answer with fixed keys so
    /// the result can be parsed into a structured form.
    pub fn prompt(&self) -> &'static str {
        match self {
            RecognitionKind::Printer => {
                "请分析这张图片中的打印机信息。请告诉我图片中显示的是什么型号的打印机\
                 以及这台打印机使用的纸张尺寸。请以JSON格式返回答案，\
                 包含\"printer_model\"和\"paper_size\"两个键。"
            }
            RecognitionKind::Medicine => {
                "请分析这张图片中的药品信息。请告诉我图片中显示的药品名称\
                 以及该药品的功效介绍。请以JSON格式返回答案，\
                 包含\"medicine_name\"和\"efficacy\"两个键。"
            }
            RecognitionKind::General => "请分析这张图片",
        }
    }
}

/// One message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user", "assistant", or "system"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Shorthand for a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single inbound inference request, created per call and discarded after
/// a terminal outcome.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub payload: PayloadKind,
    pub recognition: RecognitionKind,
    /// Raw (unconditioned) image bytes, when the payload carries an image
    pub image: Option<Vec<u8>>,
    /// Chat history for chat payloads
    pub messages: Vec<ChatMessage>,
    /// Optional per-request model override
    pub model_hint: Option<String>,
    /// Overall wall-clock budget shared across every attempt
    pub overall_budget: Duration,
}

/// A successful analysis outcome.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The model's reply text
    pub text: String,
    /// Structured form parsed from the reply, when the prompt asked for JSON
    pub structured: Option<serde_json::Value>,
    /// Name of the provider that produced the result
    pub provider: String,
    /// Model identifier reported by the provider
    pub model: String,
    /// Tokens used, if the provider reports them
    pub tokens_used: Option<u32>,
    /// Total attempts issued across all providers for this request
    pub attempts: u32,
}

/// Terminal status of an inference response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// The classified error surfaced at the upstream boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<ErrorClassification> for ErrorBody {
    fn from(c: ErrorClassification) -> Self {
        Self {
            category: c.category,
            message: c.message,
        }
    }
}

/// Response shape handed back to the upstream collaborator (HTTP layer, CLI).
#[derive(Debug, Clone, Serialize)]
pub struct InferenceResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl InferenceResponse {
    /// Build a success response from an analysis result.
    pub fn success(result: AnalysisResult) -> Self {
        Self {
            status: ResponseStatus::Success,
            result_text: Some(result.text),
            structured_json: result.structured,
            provider_used: Some(result.provider),
            model_used: Some(result.model),
            tokens_used: result.tokens_used,
            attempts: Some(result.attempts),
            error: None,
        }
    }

    /// Build an error response from a classification.
    pub fn error(classification: ErrorClassification) -> Self {
        Self {
            status: ResponseStatus::Error,
            result_text: None,
            structured_json: None,
            provider_used: None,
            model_used: None,
            tokens_used: None,
            attempts: None,
            error: Some(classification.into()),
        }
    }
}

/// Extract a structured JSON object from a model reply.
///
/// Models asked for JSON answer in one of three shapes: bare JSON, JSON
/// inside a fenced code block, or JSON embedded in surrounding prose. Tried
/// in that order; returns `None` when no object parses.
pub fn extract_structured(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    // Fenced block: ```json ... ``` or plain ```
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(inner) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    // Embedded object: widest brace span
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&trimmed[start..=end])
        .ok()
        .filter(|v| v.is_object())
}
