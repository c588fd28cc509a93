//! Execution reports: the summary of one workflow run, with markdown
//! rendering for the repair prompt and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trace::{StepStatus, TraceSnapshot};

/// Summary of a workflow execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub workflow_id: String,
    pub workflow_name: String,
    pub total_steps: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub trace: TraceSnapshot,
    /// One entry per precondition failure surfaced by a service,
    /// formatted as `node_id: message`.
    #[serde(default)]
    pub dependency_violations: Vec<String>,
}

impl ExecutionReport {
    /// True when every executed node succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Render the report as markdown: summary header, dependency
    /// violations, and the full trace table.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            format!("# Execution Report: {}", self.workflow_name),
            String::new(),
            format!("**Workflow ID:** `{}`", self.workflow_id),
            format!("**Total steps:** {}", self.total_steps),
            format!("**Successful:** {}", self.successful),
            format!("**Failed:** {}", self.failed),
            format!("**Skipped:** {}", self.skipped),
            String::new(),
        ];

        if !self.dependency_violations.is_empty() {
            lines.push("## Dependency Violations".to_string());
            for violation in &self.dependency_violations {
                lines.push(format!("- {violation}"));
            }
            lines.push(String::new());
        }

        lines.push("## Execution Trace".to_string());
        lines.push(String::new());
        lines.push("| # | Node | Service | Action | Status | Detail |".to_string());
        lines.push("|---|------|---------|--------|--------|--------|".to_string());

        for (i, step) in self.trace.steps.iter().enumerate() {
            let detail = match step.status {
                StepStatus::Success => step
                    .result
                    .as_ref()
                    .map(|result| {
                        result
                            .iter()
                            .filter(|(k, _)| k.as_str() != "status")
                            .map(|(k, v)| format!("{k}={}", compact(v)))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default(),
                _ => step.error.clone().unwrap_or_default(),
            };
            lines.push(format!(
                "| {} | `{}` | {} | {} | {} | {} |",
                i + 1,
                step.node_id,
                step.service,
                step.action,
                step.status.icon(),
                detail
            ));
        }

        lines.push(String::new());
        if let Some(duration) = self.trace.duration_secs() {
            lines.push(format!("**Duration:** {duration:.2}s"));
        }

        lines.join("\n")
    }
}

/// Compact scalar rendering for report detail cells.
fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
