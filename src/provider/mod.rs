//! # Provider Abstraction Layer
//!
//! Trait and implementations for the language-model transport used by
//! the planner and the connector builder.
//!
//! ## Overview
//!
//! - [`Provider`] - core trait: one chat turn with optional tool use
//! - [`ClaudeProvider`] - production provider using the Claude Messages API
//! - [`MockProvider`] - test provider with scripted responses
//!
//! A response is a list of [`ContentBlock`]s: text the agent wants to
//! say, plus any tool calls it wants executed. The agent session executes
//! the tools and feeds [`ContentBlock::ToolResult`] blocks back in the
//! next request, looping until the provider stops asking for tools.
//!
//! ## Creating providers
//!
//! Use [`create_provider`] to instantiate by name:
//!
//! | Name | Description | Requires |
//! |------|-------------|----------|
//! | `claude` | Claude Messages API | `ANTHROPIC_API_KEY` |
//! | `mock` | Testing | Nothing |

mod claude;
mod mock;

pub use claude::ClaudeProvider;
pub use mock::MockProvider;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;

/// Average characters per token for mixed content (prose + JSON).
const CHARS_PER_TOKEN: f32 = 3.0;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One content block in a message or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// The model requests a tool invocation.
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    /// A completed tool invocation, echoed back to the model.
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolCall {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_call_id: id.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// One message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// JSON schema for one tool exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Request for one chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSchema>,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: 4096,
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::MaxTokens => "max_tokens",
        }
    }
}

/// Token usage statistics for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Estimate usage from character counts when the transport does not
    /// report real numbers (mock provider).
    pub fn estimate(prompt_len: usize, response_len: usize) -> Self {
        Self::new(
            (prompt_len as f32 / CHARS_PER_TOKEN).ceil() as u32,
            (response_len as f32 / CHARS_PER_TOKEN).ceil() as u32,
        )
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Response from one chat turn.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Tool calls requested in this turn, in order.
    pub fn tool_calls(&self) -> Vec<&ContentBlock> {
        self.content
            .iter()
            .filter(|block| matches!(block, ContentBlock::ToolCall { .. }))
            .collect()
    }

    /// Concatenated text content of this turn.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Core trait all LM providers implement.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name ("claude", "mock").
    fn name(&self) -> &str;

    /// Default model when the request leaves it implicit.
    fn default_model(&self) -> &str;

    /// Execute one chat turn.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Create a provider instance by name.
pub fn create_provider(name: &str, settings: &Settings) -> Result<Box<dyn Provider>> {
    match name.to_lowercase().as_str() {
        "claude" => Ok(Box::new(ClaudeProvider::new(settings)?)),
        "mock" => Ok(Box::new(MockProvider::new())),
        _ => anyhow::bail!("Unknown provider: '{}'. Available: claude, mock", name),
    }
}

// ============================================================================
// TESTS
// ============================================================================
