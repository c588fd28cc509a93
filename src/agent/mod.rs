//! Agent sessions: a bounded tool loop over one [`Provider`].
//!
//! Each turn sends the system prompt, the conversation so far, and the
//! tool schemas. Tool calls in the response are executed through the
//! [`ToolRegistry`]; their results are appended and the loop continues
//! until the provider stops asking for tools or the turn budget runs out.
//! Every step streams `text` / `tool_use` / `tool_result` events outward,
//! ending with a terminal `result` event.

pub mod tools;

pub use tools::{ToolRegistry, DEFAULT_TOOL_NAMES};

use tracing::{debug, instrument};

use crate::error::PlannerError;
use crate::event::{EventSender, PlannerEvent};
use crate::provider::{
    ChatMessage, ChatRequest, ContentBlock, Provider, TokenUsage,
};

/// Configuration for one agent session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub model: String,
    pub max_turns: usize,
}

impl AgentConfig {
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>, max_turns: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: model.into(),
            max_turns,
        }
    }
}

/// Run one agent session to completion, streaming events outward.
///
/// Returns the total token usage. A closed event stream aborts the
/// session with [`PlannerError::Cancelled`].
#[instrument(skip_all, fields(model = %config.model, max_turns = config.max_turns))]
pub async fn run_agent(
    provider: &dyn Provider,
    config: &AgentConfig,
    prompt: String,
    tools: &ToolRegistry,
    events: &EventSender,
) -> Result<TokenUsage, PlannerError> {
    let mut messages = vec![ChatMessage::user_text(prompt)];
    let mut total_usage = TokenUsage::default();

    for turn in 0..config.max_turns {
        let request = ChatRequest::new(&config.model, &config.system_prompt)
            .with_messages(messages.clone())
            .with_tools(tools.schemas());

        let response = provider
            .chat(request)
            .await
            .map_err(|e| PlannerError::Provider(e.to_string()))?;
        total_usage.add(response.usage);
        debug!(turn, blocks = response.content.len(), "agent turn complete");

        let mut tool_results = Vec::new();
        for block in &response.content {
            match block {
                ContentBlock::Text { text } => {
                    if !text.trim().is_empty() {
                        events.text(text.clone()).await?;
                    }
                }
                ContentBlock::ToolCall { id, name, input } => {
                    events
                        .send(PlannerEvent::ToolUse {
                            tool: name.clone(),
                            input: input.clone(),
                        })
                        .await?;

                    let (content, is_error) = match tools.execute(name, input).await {
                        Ok(output) => (output, false),
                        Err(error) => (error, true),
                    };

                    events
                        .send(PlannerEvent::ToolResult {
                            tool: name.clone(),
                            output: content.clone(),
                        })
                        .await?;
                    tool_results.push(ContentBlock::tool_result(id.clone(), content, is_error));
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }

        if tool_results.is_empty() {
            events
                .send(PlannerEvent::Result {
                    stop_reason: response.stop_reason.as_str().to_string(),
                    usage: total_usage,
                })
                .await?;
            return Ok(total_usage);
        }

        messages.push(ChatMessage::assistant(response.content));
        messages.push(ChatMessage::tool_results(tool_results));
    }

    Err(PlannerError::TurnLimit(config.max_turns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn run_with_script(
        script: Vec<Vec<ContentBlock>>,
    ) -> (Vec<PlannerEvent>, Result<TokenUsage, PlannerError>, TempDir) {
        let workspace = TempDir::new().unwrap();
        let provider = MockProvider::with_script(script);
        let tools = ToolRegistry::new(workspace.path(), "default", None);
        let config = AgentConfig::new("You are a planner", "mock-model", 10);
        let (tx, mut rx) = mpsc::channel(64);
        let events = EventSender::new(tx);

        let result = run_agent(&provider, &config, "Design it".to_string(), &tools, &events).await;
        drop(events);

        let mut collected = Vec::new();
        while let Some(event) = rx.recv().await {
            collected.push(event);
        }
        (collected, result, workspace)
    }

    #[tokio::test]
    async fn text_only_session_ends_after_one_turn() {
        let (events, result, _ws) =
            run_with_script(vec![vec![ContentBlock::text("All done.")]]).await;

        assert!(result.is_ok());
        assert!(matches!(&events[0], PlannerEvent::Text(t) if t == "All done."));
        assert!(matches!(events.last(), Some(PlannerEvent::Result { .. })));
    }

    #[tokio::test]
    async fn tool_loop_executes_and_feeds_back() {
        let (events, result, ws) = run_with_script(vec![
            vec![
                ContentBlock::text("Writing the artifact."),
                ContentBlock::tool_call(
                    "tc_1",
                    "write_file",
                    json!({"path": "workflow.json", "content": "{}"}),
                ),
            ],
            vec![ContentBlock::text("Done.")],
        ])
        .await;

        assert!(result.is_ok());
        assert!(ws.path().join("workflow.json").exists());

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                PlannerEvent::Text(_) => "text",
                PlannerEvent::ToolUse { .. } => "tool_use",
                PlannerEvent::ToolResult { .. } => "tool_result",
                PlannerEvent::Result { .. } => "result",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["text", "tool_use", "tool_result", "text", "result"]);
    }

    #[tokio::test]
    async fn failed_tool_is_reported_not_fatal() {
        let (events, result, _ws) = run_with_script(vec![
            vec![ContentBlock::tool_call(
                "tc_1",
                "read_file",
                json!({"path": "missing.json"}),
            )],
            vec![ContentBlock::text("Recovered.")],
        ])
        .await;

        assert!(result.is_ok());
        let tool_result = events
            .iter()
            .find_map(|e| match e {
                PlannerEvent::ToolResult { output, .. } => Some(output.clone()),
                _ => None,
            })
            .unwrap();
        assert!(tool_result.contains("File not found"));
    }

    #[tokio::test]
    async fn turn_limit_is_enforced() {
        // Every turn asks for another tool call; the loop must cut off.
        let script: Vec<Vec<ContentBlock>> = (0..20)
            .map(|i| {
                vec![ContentBlock::tool_call(
                    format!("tc_{i}"),
                    "search_apis",
                    json!({"query": "slack"}),
                )]
            })
            .collect();
        let (_events, result, _ws) = run_with_script(script).await;
        assert!(matches!(result, Err(PlannerError::TurnLimit(10))));
    }
}
