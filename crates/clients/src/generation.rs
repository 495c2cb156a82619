//! OpenAI-compatible chat-completion client.

use async_trait::async_trait;
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TextGenerator;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::{ensure_success, ClientError};

const COLLABORATOR: &str = "text generator";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}

/// Deterministic (temperature 0) single-turn completion client.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl ChatCompletionClient {
    pub fn new(config: GenerationConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Send `prompt` as a single user message and return the reply text.
    pub async fn chat(&self, prompt: &str) -> Result<String, ClientError> {
        let api_key = self.config.api_key.as_deref().ok_or(ClientError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.api_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatResponse = ensure_success(response).await?.json().await?;
        extract_reply(parsed)
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        self.chat(prompt)
            .await
            .map_err(|e| CoreError::unavailable(COLLABORATOR, e))
    }
}

/// First choice's content; an empty reply counts as malformed.
pub fn extract_reply(response: ChatResponse) -> Result<String, ClientError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(ClientError::MalformedResponse(
            "completion contained no text".into(),
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn extracts_first_choice() {
        let parsed: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  Replace the fan.  "}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .unwrap();
        assert_eq!(extract_reply(parsed).unwrap(), "Replace the fan.");
    }

    #[test]
    fn empty_reply_is_malformed() {
        let parsed: ChatResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert_matches!(extract_reply(parsed), Err(ClientError::MalformedResponse(_)));

        let parsed: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": null}}]
        }))
        .unwrap();
        assert_matches!(extract_reply(parsed), Err(ClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let client = ChatCompletionClient::new(GenerationConfig {
            api_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap();
        assert_matches!(client.chat("hi").await, Err(ClientError::MissingApiKey));
    }

    #[test]
    fn request_is_deterministic() {
        let body = ChatRequest {
            model: "m",
            temperature: 0.0,
            messages: [ChatMessage {
                role: "user",
                content: "p",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
