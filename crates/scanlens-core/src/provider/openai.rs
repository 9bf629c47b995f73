//! OpenAI vision/chat adapter using the Chat Completions API.
//!
//! Images travel as data-URL content parts in the user message. This is the
//! primary vision-capable provider and the only one that may route its first
//! attempt through the optional forward proxy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{HttpClients, ProviderAdapter, ProviderRequest, ProviderResponse};
use crate::error::ProviderError;

/// OpenAI adapter (Chat Completions).
pub struct OpenAiAdapter {
    clients: HttpClients,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiAdapter {
    pub fn new(clients: HttpClients, api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            clients,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> ChatRequest {
        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let mut content = vec![ChatContent::Text {
                    text: msg.content.clone(),
                }];
                // The image rides on the final user message
                if i == request.messages.len() - 1 && msg.role == "user" {
                    if let Some(image) = &request.image {
                        content.insert(
                            0,
                            ChatContent::ImageUrl {
                                image_url: ImageUrl {
                                    url: image.data_url(),
                                },
                            },
                        );
                    }
                }
                Message {
                    role: msg.role.clone(),
                    content,
                }
            })
            .collect();

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
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
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
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn vision_capable(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
        use_proxy: bool,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.build_body(request);

        let resp = self
            .clients
            .select(use_proxy)
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::transport("OpenAI request failed", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::http_status("OpenAI", status.as_u16(), &text));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::bad_body(format!("Failed to parse OpenAI response: {e}"))
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ProviderError::bad_body("OpenAI returned empty choices array".to_string())
            })?;

        Ok(ProviderResponse {
            text: text.trim().to_string(),
            model: chat_resp.model,
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
        })
    }
}
