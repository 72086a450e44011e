//! Language model client
//!
//! Replies are generated through the `Anthropic` Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Who said a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Generates assistant replies
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation under a system prompt
    ///
    /// # Errors
    ///
    /// Returns error if the model call fails
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// `Anthropic` Messages API client
pub struct AnthropicChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_url: String,
}

/// Messages API request
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
}

/// Merge consecutive turns from the same speaker and drop leading assistant
/// turns; the Messages API expects alternating turns starting with the user
fn normalize_turns(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut turns: Vec<ChatMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        if turns.is_empty() && message.role == Role::Assistant {
            continue;
        }
        if let Some(last) = turns.last_mut().filter(|last| last.role == message.role) {
            last.content.push('\n');
            last.content.push_str(&message.content);
        } else {
            turns.push(message.clone());
        }
    }

    turns
}

/// Messages API response
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ResponseContent>,
}

/// Response content block
#[derive(Debug, Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

impl AnthropicChat {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Anthropic API key required for replies".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            api_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Point the client at a different Messages endpoint
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Model identifier in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for AnthropicChat {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let turns = normalize_turns(messages);
        if turns.is_empty() {
            return Err(Error::Llm("no user turn to complete".to_string()));
        }

        let request = MessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: &turns,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("API error {status}: {body}")));
        }

        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Parse error: {e}")))?;

        let reply = result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(" ");

        if reply.trim().is_empty() {
            return Err(Error::Llm("Empty response from model".to_string()));
        }

        tracing::debug!(model = %self.model, chars = reply.len(), "reply generated");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_shape() {
        let messages = vec![
            ChatMessage::user("Who are you?"),
            ChatMessage::assistant("Toast."),
        ];
        let request = MessageRequest {
            model: "claude-3-haiku-20240307",
            max_tokens: 256,
            system: "Be brief.",
            messages: &messages,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 256,
                "system": "Be brief.",
                "messages": [
                    {"role": "user", "content": "Who are you?"},
                    {"role": "assistant", "content": "Toast."}
                ]
            })
        );
    }

    #[test]
    fn turns_alternate_from_user() {
        let turns = normalize_turns(&[
            ChatMessage::assistant("Hi, I'm Toast!"),
            ChatMessage::user("talk to boomer dad"),
            ChatMessage::user("actually wait"),
            ChatMessage::assistant("Back in my day..."),
        ]);

        assert_eq!(
            turns,
            vec![
                ChatMessage::user("talk to boomer dad\nactually wait"),
                ChatMessage::assistant("Back in my day..."),
            ]
        );
    }

    #[test]
    fn requires_api_key() {
        assert!(AnthropicChat::new(String::new(), "m".to_string(), 10).is_err());
    }

    #[tokio::test]
    async fn rejects_empty_conversation() {
        let chat = AnthropicChat::new("key".to_string(), "m".to_string(), 10).unwrap();
        let err = chat.complete("system", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));

        let err = chat
            .complete("system", &[ChatMessage::assistant("only me")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }
}
