//! Blocking Messages API client.

use crate::config::LlmConfig;
use deck_core::{Error, Result, TextGenerator};
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API request body.
#[derive(Debug, Clone, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Messages API response, reduced to the content blocks.
#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Sends one user message per call and returns the first text block.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        }
    }
}

impl TextGenerator for AnthropicClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        log::debug!(
            "Sending {} chars to {} ({})",
            prompt.len(),
            self.config.model,
            self.config.messages_url()
        );

        let response = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .map_err(|e| Error::Llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::Llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Llm(format!("API error {}: {}", status, body)));
        }

        extract_text(&body)
    }
}

/// Text of the first content block of a Messages API response body.
pub fn extract_text(body: &str) -> Result<String> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| Error::Llm(format!("Failed to parse response: {}", e)))?;

    let first = response
        .content
        .into_iter()
        .next()
        .ok_or_else(|| Error::Llm("Response has no content".to_string()))?;

    match first.text {
        Some(text) => Ok(text),
        None => Err(Error::Llm(format!(
            "First content block is '{}', not text",
            first.kind
        ))),
    }
}
