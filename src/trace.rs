//! Execution tracing: append-only log of attempted workflow steps.
//!
//! - [`TraceStep`]: one node's attempted execution with resolved
//!   parameters, result or error, and status.
//! - [`ExecutionTrace`]: thread-safe, append-only; cloned handles share
//!   the same underlying log so services and the executor write to one
//!   sink. Never reordered.
//!
//! A trace is created fresh per run and discarded (or snapshotted into an
//! execution report) when the run ends.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::service::Params;

/// Status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Compact icon used in rendered report tables.
    pub fn icon(&self) -> &'static str {
        match self {
            StepStatus::Success => "OK",
            StepStatus::Failed => "FAIL",
            StepStatus::Skipped => "SKIP",
        }
    }
}

/// A single step recorded during workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub node_id: String,
    pub service: String,
    pub action: String,
    /// Resolved parameters (post-templating).
    pub parameters: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Params>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Serializable snapshot of a full trace, embedded in execution reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub steps: Vec<TraceStep>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TraceSnapshot {
    /// Wall-clock duration of the run, if it completed.
    pub fn duration_secs(&self) -> Option<f64> {
        self.completed_at.map(|done| {
            (done - self.started_at)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0)
        })
    }
}

struct TraceInner {
    steps: RwLock<Vec<TraceStep>>,
    started_at: RwLock<DateTime<Utc>>,
    completed_at: RwLock<Option<DateTime<Utc>>>,
}

/// Thread-safe, append-only execution trace.
///
/// Clones share the underlying log (Arc), so the executor and every
/// service hold handles to the same sink.
#[derive(Clone)]
pub struct ExecutionTrace {
    inner: Arc<TraceInner>,
}

impl ExecutionTrace {
    /// Create a new empty trace (call at run start).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TraceInner {
                steps: RwLock::new(Vec::new()),
                started_at: RwLock::new(Utc::now()),
                completed_at: RwLock::new(None),
            }),
        }
    }

    /// Record a successful step with its resolved params and result.
    pub fn record_success(
        &self,
        node_id: &str,
        service: &str,
        action: &str,
        parameters: Params,
        result: Params,
    ) {
        self.push(TraceStep {
            node_id: node_id.to_string(),
            service: service.to_string(),
            action: action.to_string(),
            parameters,
            result: Some(result),
            status: StepStatus::Success,
            error: None,
            timestamp: Utc::now(),
        });
    }

    /// Record a failed step with its error string.
    pub fn record_failure(
        &self,
        node_id: &str,
        service: &str,
        action: &str,
        parameters: Params,
        error: impl Into<String>,
    ) {
        self.push(TraceStep {
            node_id: node_id.to_string(),
            service: service.to_string(),
            action: action.to_string(),
            parameters,
            result: None,
            status: StepStatus::Failed,
            error: Some(error.into()),
            timestamp: Utc::now(),
        });
    }

    /// Record a skipped step (upstream failure).
    pub fn record_skip(
        &self,
        node_id: &str,
        service: &str,
        action: &str,
        reason: impl Into<String>,
    ) {
        self.push(TraceStep {
            node_id: node_id.to_string(),
            service: service.to_string(),
            action: action.to_string(),
            parameters: Params::new(),
            result: None,
            status: StepStatus::Skipped,
            error: Some(reason.into()),
            timestamp: Utc::now(),
        });
    }

    fn push(&self, step: TraceStep) {
        self.inner.steps.write().push(step);
    }

    /// Stamp the trace's start timestamp (executor calls this first).
    pub fn mark_started(&self) {
        *self.inner.started_at.write() = Utc::now();
    }

    /// Stamp the trace's completion timestamp.
    pub fn mark_completed(&self) {
        *self.inner.completed_at.write() = Some(Utc::now());
    }

    /// All recorded steps, in append order (cloned).
    pub fn steps(&self) -> Vec<TraceStep> {
        self.inner.steps.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.steps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the full trace for embedding in a report.
    pub fn snapshot(&self) -> TraceSnapshot {
        TraceSnapshot {
            steps: self.steps(),
            started_at: *self.inner.started_at.read(),
            completed_at: *self.inner.completed_at.read(),
        }
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTrace")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn trace_starts_empty() {
        let trace = ExecutionTrace::new();
        assert!(trace.is_empty());
        assert_eq!(trace.len(), 0);
    }

    #[test]
    fn record_success_appends_step() {
        let trace = ExecutionTrace::new();
        trace.record_success(
            "create_hr_record",
            "hr",
            "create_employee",
            params(&[("employee_name", "Alice Chen")]),
            params(&[("status", "created")]),
        );

        let steps = trace.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].node_id, "create_hr_record");
        assert_eq!(steps[0].status, StepStatus::Success);
        assert!(steps[0].error.is_none());
        assert_eq!(steps[0].result.as_ref().unwrap()["status"], "created");
    }

    #[test]
    fn record_failure_and_skip_carry_errors() {
        let trace = ExecutionTrace::new();
        trace.record_failure(
            "invite_slack",
            "slack",
            "invite_user",
            Params::new(),
            "[rate_limit] Slack rate limit hit",
        );
        trace.record_skip(
            "send_welcome",
            "google",
            "send_email",
            "Skipped due to upstream failure: invite_slack",
        );

        let steps = trace.steps();
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert!(steps[0].error.as_ref().unwrap().contains("rate_limit"));
        assert_eq!(steps[1].status, StepStatus::Skipped);
        assert!(steps[1].error.as_ref().unwrap().contains("invite_slack"));
        assert!(steps[1].parameters.is_empty());
    }

    #[test]
    fn append_order_is_preserved() {
        let trace = ExecutionTrace::new();
        for i in 0..5 {
            trace.record_success(
                &format!("node{i}"),
                "hr",
                "create_employee",
                Params::new(),
                Params::new(),
            );
        }
        let ids: Vec<String> = trace.steps().into_iter().map(|s| s.node_id).collect();
        assert_eq!(ids, vec!["node0", "node1", "node2", "node3", "node4"]);
    }

    #[test]
    fn cloned_handles_share_the_log() {
        let trace = ExecutionTrace::new();
        let handle = trace.clone();
        handle.record_skip("a", "hr", "create_employee", "reason");
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn snapshot_serializes_with_status_strings() {
        let trace = ExecutionTrace::new();
        trace.mark_started();
        trace.record_success("a", "hr", "create_employee", Params::new(), Params::new());
        trace.mark_completed();

        let snapshot = trace.snapshot();
        assert!(snapshot.duration_secs().is_some());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["steps"][0]["status"], "success");
        assert!(json["completed_at"].is_string());
    }

    #[test]
    fn step_status_icons() {
        assert_eq!(StepStatus::Success.icon(), "OK");
        assert_eq!(StepStatus::Failed.icon(), "FAIL");
        assert_eq!(StepStatus::Skipped.icon(), "SKIP");
    }
}
