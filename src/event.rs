//! Streamed event envelope.
//!
//! Every stage of the planner loop emits events shaped as
//! `{"type": ..., "content": ...}`. The recognized types are listed in
//! [`PlannerEvent`]; consumers that do not recognize a type should skip
//! it rather than fail.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::PlannerError;
use crate::provider::TokenUsage;
use crate::report::ExecutionReport;
use crate::workflow::Workflow;

/// One streamed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum PlannerEvent {
    /// Narrative text from the agent.
    Text(String),
    /// A tool invocation is starting.
    ToolUse { tool: String, input: Value },
    /// A tool invocation completed.
    ToolResult { tool: String, output: String },
    /// The parsed workflow payload.
    Workflow(Workflow),
    /// An execution finished; includes the rendered markdown and the
    /// attempt number (1-based).
    ExecutionReport {
        report: ExecutionReport,
        markdown: String,
        attempt: u32,
    },
    /// A custom connector was generated, validated, and persisted.
    ConnectorBuilt {
        service: String,
        path: PathBuf,
        actions: Vec<String>,
    },
    /// The final workflow was persisted to the store.
    WorkflowSaved {
        workflow_id: String,
        team: String,
        version: u32,
    },
    /// The ephemeral workspace path for this run.
    Workspace { path: PathBuf },
    /// Terminal usage summary for one agent session.
    Result {
        stop_reason: String,
        usage: TokenUsage,
    },
    /// An error message.
    Error(String),
}

/// Sending half of a planner event stream.
///
/// A failed send means the receiver was dropped; the planner loop treats
/// that as cancellation and aborts at the next suspension point.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PlannerEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<PlannerEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: PlannerEvent) -> Result<(), PlannerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| PlannerError::Cancelled)
    }

    /// Convenience for error events.
    pub async fn error(&self, message: impl Into<String>) -> Result<(), PlannerError> {
        self.send(PlannerEvent::Error(message.into())).await
    }

    /// Convenience for narrative text.
    pub async fn text(&self, message: impl Into<String>) -> Result<(), PlannerError> {
        self.send(PlannerEvent::Text(message.into())).await
    }
}
