//! DeepSeek adapter — the text-only chat fallback.
//!
//! DeepSeek exposes an OpenAI-compatible Chat Completions endpoint but has no
//! vision support. When an image payload falls back here, the conditioned
//! image is inlined into the prompt text as a data URL; the answer will be
//! best-effort. The dispatcher conditions images against this adapter's
//! tighter token-budget profile before invoking it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{HttpClients, ProviderAdapter, ProviderRequest, ProviderResponse};
use crate::error::ProviderError;

/// DeepSeek adapter (OpenAI-compatible, text-only).
pub struct DeepSeekAdapter {
    clients: HttpClients,
    api_key: String,
    model: String,
    base_url: String,
}

impl DeepSeekAdapter {
    pub fn new(clients: HttpClients, api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            clients,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> ChatRequest {
        let mut messages: Vec<Message> = request
            .messages
            .iter()
            .map(|m| Message {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();

        // Text-only backend: inline the image into the last user message
        if let Some(image) = &request.image {
            if let Some(last) = messages.iter_mut().rev().find(|m| m.role == "user") {
                last.content = format!("{}\n\n图片base64数据: {}", last.content, image.data_url());
            }
        }

        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            max_tokens: request.max_tokens,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for DeepSeekAdapter {
    fn name(&self) -> &str {
        "deepseek"
    }

    fn vision_capable(&self) -> bool {
        false
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
        use_proxy: bool,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(request);

        let resp = self
            .clients
            .select(use_proxy)
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::transport("DeepSeek request failed", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(
                "DeepSeek",
                status.as_u16(),
                &text,
            ));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::bad_body(format!("Failed to parse DeepSeek response: {e}"))
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ProviderError::bad_body("DeepSeek returned empty choices array".to_string())
            })?;

        Ok(ProviderResponse {
            text: text.trim().to_string(),
            model: chat_resp.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioner::ConditionedImage;
    use crate::types::ChatMessage;

    fn adapter() -> DeepSeekAdapter {
        DeepSeekAdapter::new(
            HttpClients::direct_only(reqwest::Client::new()),
            "sk-test",
            "deepseek-chat",
            "https://api.deepseek.com/v1/",
        )
    }

    #[test]
    fn test_image_inlined_into_prompt_text() {
        let request = ProviderRequest {
            messages: vec![ChatMessage::user("分析图片")],
            image: Some(ConditionedImage::passthrough(&[9, 9, 9], "image/jpeg")),
            model: None,
            max_tokens: 2000,
        };
        let body = serde_json::to_value(adapter().build_body(&request)).unwrap();
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with("分析图片"));
        assert!(content.contains("图片base64数据: data:image/jpeg;base64,"));
    }

    #[test]
    fn test_plain_chat_passes_messages_through() {
        let request = ProviderRequest {
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "be brief".to_string(),
                },
                ChatMessage::user("hi"),
            ],
            image: None,
            model: None,
            max_tokens: 2000,
        };
        let body = serde_json::to_value(adapter().build_body(&request)).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let a = adapter();
        assert_eq!(a.base_url, "https://api.deepseek.com/v1");
    }
}
