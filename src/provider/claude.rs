//! Claude provider using the Anthropic Messages API.
//!
//! Supports tool use: the request carries tool schemas, the response may
//! contain `tool_use` blocks which the agent session executes and echoes
//! back as `tool_result` blocks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    ChatMessage, ChatRequest, ChatResponse, ContentBlock, Provider, Role, StopReason, TokenUsage,
};
use crate::config::Settings;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Claude provider over the Messages API.
pub struct ClaudeProvider {
    api_key: String,
    client: Client,
}

impl ClaudeProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .anthropic_api_key
            .clone()
            .context("ANTHROPIC_API_KEY not set")?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("flowforge/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { api_key, client })
    }

    /// Map model aliases to concrete model ids.
    fn resolve_model(&self, model: &str) -> String {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("claude-") {
            return model.to_string();
        }
        match lower.as_str() {
            "haiku" => "claude-3-5-haiku-latest".to_string(),
            "sonnet" => "claude-sonnet-4-5".to_string(),
            "opus" => "claude-opus-4-1".to_string(),
            _ => model.to_string(),
        }
    }

    /// Render conversation history into Messages API shape.
    fn render_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                let content: Vec<Value> = message
                    .content
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                        ContentBlock::ToolCall { id, name, input } => json!({
                            "type": "tool_use", "id": id, "name": name, "input": input
                        }),
                        ContentBlock::ToolResult {
                            tool_call_id,
                            content,
                            is_error,
                        } => json!({
                            "type": "tool_result",
                            "tool_use_id": tool_call_id,
                            "content": content,
                            "is_error": is_error
                        }),
                    })
                    .collect();
                json!({"role": role, "content": content})
            })
            .collect()
    }

    fn parse_content(body: &Value) -> Vec<ContentBlock> {
        body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| match block["type"].as_str() {
                        Some("text") => Some(ContentBlock::text(
                            block["text"].as_str().unwrap_or_default(),
                        )),
                        Some("tool_use") => Some(ContentBlock::tool_call(
                            block["id"].as_str().unwrap_or_default(),
                            block["name"].as_str().unwrap_or_default(),
                            block["input"].clone(),
                        )),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let model = self.resolve_model(&request.model);

        let mut payload = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": Self::render_messages(&request.messages),
        });
        if !request.tools.is_empty() {
            payload["tools"] = json!(request.tools);
        }

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to the Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {}: {}", status, body);
        }

        let body: Value = response
            .json()
            .await
            .context("Invalid JSON from the Anthropic API")?;

        let stop_reason = match body["stop_reason"].as_str() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let usage = TokenUsage::new(
            body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        );

        Ok(ChatResponse {
            content: Self::parse_content(&body),
            stop_reason,
            usage,
        })
    }
}
