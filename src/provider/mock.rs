//! Mock provider for testing.
//!
//! Returns scripted responses without network calls. Script tool-call
//! turns to exercise the full agent loop: the session executes the tools
//! for real against its workspace, then the next scripted response is
//! served.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ContentBlock, Provider, StopReason, TokenUsage};

/// Mock provider with a FIFO queue of scripted turns.
pub struct MockProvider {
    responses: Mutex<VecDeque<Vec<ContentBlock>>>,
    default_text: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_text: "Mock response".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create with a queue of scripted turns.
    pub fn with_script(turns: Vec<Vec<ContentBlock>>) -> Self {
        Self {
            responses: Mutex::new(turns.into()),
            default_text: "Mock response".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append one scripted turn.
    pub fn queue_turn(&self, blocks: Vec<ContentBlock>) {
        self.responses.lock().unwrap().push_back(blocks);
    }

    /// All requests made so far (for assertions).
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let prompt_len: usize = request
            .messages
            .iter()
            .flat_map(|m| &m.content)
            .map(|block| match block {
                ContentBlock::Text { text } => text.len(),
                ContentBlock::ToolResult { content, .. } => content.len(),
                ContentBlock::ToolCall { .. } => 0,
            })
            .sum();
        self.requests.lock().unwrap().push(request);

        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![ContentBlock::text(self.default_text.clone())]);

        let has_tool_calls = content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolCall { .. }));
        let response_len: usize = content
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => text.len(),
                _ => 0,
            })
            .sum();

        Ok(ChatResponse {
            content,
            stop_reason: if has_tool_calls {
                StopReason::ToolUse
            } else {
                StopReason::EndTurn
            },
            usage: TokenUsage::estimate(prompt_len, response_len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn default_response_when_script_empty() {
        let provider = MockProvider::new();
        let response = provider
            .chat(ChatRequest::new("mock-model", "system"))
            .await
            .unwrap();
        assert_eq!(response.text(), "Mock response");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn scripted_turns_served_in_order() {
        let provider = MockProvider::with_script(vec![
            vec![ContentBlock::tool_call(
                "tc_1",
                "write_file",
                json!({"path": "workflow.json", "content": "{}"}),
            )],
            vec![ContentBlock::text("Done.")],
        ]);

        let first = provider
            .chat(ChatRequest::new("mock-model", "system"))
            .await
            .unwrap();
        assert_eq!(first.stop_reason, StopReason::ToolUse);
        assert_eq!(first.tool_calls().len(), 1);

        let second = provider
            .chat(ChatRequest::new("mock-model", "system"))
            .await
            .unwrap();
        assert_eq!(second.stop_reason, StopReason::EndTurn);
        assert_eq!(second.text(), "Done.");
    }

    #[tokio::test]
    async fn records_requests() {
        let provider = MockProvider::new();
        let request = ChatRequest::new("mock-model", "system")
            .with_messages(vec![crate::provider::ChatMessage::user_text("hello")]);
        provider.chat(request).await.unwrap();

        let recorded = provider.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].messages.len(), 1);
        assert!(provider.last_request().is_some());
    }
}
