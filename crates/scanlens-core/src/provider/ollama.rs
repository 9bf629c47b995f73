//! Ollama adapter for the locally hosted model server.
//!
//! Talks to a local Ollama instance via its chat API. No authentication and
//! no proxy — but on-device inference can legitimately take tens of minutes,
//! so this adapter runs with a much larger per-call timeout than the cloud
//! backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{HttpClients, ProviderAdapter, ProviderRequest, ProviderResponse};
use crate::error::ProviderError;

/// Ollama adapter for local inference.
pub struct OllamaAdapter {
    clients: HttpClients,
    endpoint: String,
    model: String,
}

impl OllamaAdapter {
    pub fn new(clients: HttpClients, endpoint: &str, model: &str) -> Self {
        Self {
            clients,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> OllamaChatRequest {
        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(i, msg)| OllamaMessage {
                role: msg.role.clone(),
                content: msg.content.clone(),
                images: if i == request.messages.len() - 1 && msg.role == "user" {
                    request.image.as_ref().map(|img| vec![img.data.clone()])
                } else {
                    None
                },
            })
            .collect();

        OllamaChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            stream: false,
        }
    }
}

/// Ollama /api/chat request body.
#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

/// Ollama /api/chat response (non-streaming).
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn vision_capable(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
        _use_proxy: bool,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = self.build_body(request);

        // Local server; the proxy switch never applies here
        let resp = self
            .clients
            .select(false)
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::transport("Ollama request failed", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::http_status("Ollama", status.as_u16(), &text));
        }

        let chat_resp: OllamaChatResponse = resp.json().await.map_err(|e| {
            ProviderError::bad_body(format!("Failed to parse Ollama response: {e}"))
        })?;

        let text = chat_resp
            .message
            .map(|m| m.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::bad_body(
                "Ollama returned empty response — no content generated".to_string(),
            ));
        }

        Ok(ProviderResponse {
            text,
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            tokens_used: None, // Ollama's chat endpoint doesn't report usage here
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditioner::ConditionedImage;
    use crate::types::ChatMessage;

    fn adapter() -> OllamaAdapter {
        OllamaAdapter::new(
            HttpClients::direct_only(reqwest::Client::new()),
            "http://localhost:11434/",
            "gemma3",
        )
    }

    #[test]
    fn test_body_carries_base64_images_field() {
        let request = ProviderRequest {
            messages: vec![ChatMessage::user("请分析这张图片")],
            image: Some(ConditionedImage::passthrough(&[5, 5], "image/png")),
            model: None,
            max_tokens: 1000,
        };
        let body = serde_json::to_value(adapter().build_body(&request)).unwrap();
        assert_eq!(body["model"], "gemma3");
        assert_eq!(body["stream"], false);
        let images = body["messages"][0]["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_body_omits_images_without_payload() {
        let request = ProviderRequest {
            messages: vec![ChatMessage::user("hello")],
            image: None,
            model: None,
            max_tokens: 1000,
        };
        let body = serde_json::to_value(adapter().build_body(&request)).unwrap();
        assert!(body["messages"][0].get("images").is_none());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        assert_eq!(adapter().endpoint, "http://localhost:11434");
    }
}
