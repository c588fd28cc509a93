//! Unified error handling for FlowForge.
//!
//! Three tiers of errors exist at runtime:
//!
//! - **Structural** (fatal per run): DAG cycles, schema violations after the
//!   last repair attempt, unstartable subprocesses. Surfaced as
//!   [`ExecutorError`] / [`PlannerError`] and abort the planner loop.
//! - **Operational** (per-node): [`ServiceError`] values carrying a wire
//!   [`ErrorKind`]. These mark a node failed, propagate skips downstream,
//!   and feed the repair prompt.
//! - **Transient** (local): tool failures inside an agent session. These
//!   surface as tool-result errors the planner agent can react to.
//!
//! [`FlowError`] wraps the specific error types for the CLI entry point.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// WIRE ERROR TAXONOMY
// ============================================================================

/// Error kinds shared by simulator services, real connectors, and the
/// executor. The `as_str` form is the wire string used in trace error
/// messages and streamed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthError,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    RateLimit,
    UnknownService,
    UnknownAction,
    PreconditionFailed,
    ConnectorError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthError => "auth_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::UnknownService => "unknown_service",
            ErrorKind::UnknownAction => "unknown_action",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::ConnectorError => "connector_error",
        }
    }

    /// Parse a wire string back into a kind (custom connector manifests
    /// name kinds as strings).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "auth_error" => ErrorKind::AuthError,
            "permission_denied" => ErrorKind::PermissionDenied,
            "not_found" => ErrorKind::NotFound,
            "already_exists" => ErrorKind::AlreadyExists,
            "rate_limit" => ErrorKind::RateLimit,
            "unknown_service" => ErrorKind::UnknownService,
            "unknown_action" => ErrorKind::UnknownAction,
            "precondition_failed" => ErrorKind::PreconditionFailed,
            "connector_error" => ErrorKind::ConnectorError,
            _ => return None,
        })
    }

    /// Map an HTTP status to the common taxonomy (real connectors).
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::AuthError,
            403 => ErrorKind::PermissionDenied,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::AlreadyExists,
            429 => ErrorKind::RateLimit,
            _ => ErrorKind::ConnectorError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SERVICE ERROR
// ============================================================================

/// Error raised by a service action: a precondition violation in the
/// simulator, a mapped provider error in a real connector, or an
/// unknown service/action during dispatch.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A cross-service precondition was not met.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn connector(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectorError, message)
    }

    pub fn unknown_service(service: &str) -> Self {
        Self::new(
            ErrorKind::UnknownService,
            format!("Unknown service: {service}"),
        )
    }

    pub fn unknown_action(service: &str, action: &str) -> Self {
        Self::new(
            ErrorKind::UnknownAction,
            format!("Unknown action {action} for service {service}"),
        )
    }
}

// ============================================================================
// EXECUTOR ERROR (structural, fatal per run)
// ============================================================================

/// Fatal executor errors. Operational per-node failures never surface
/// here; they are recorded in the trace instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Cycle detected in workflow DAG involving nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },
}

// ============================================================================
// PLANNER ERROR
// ============================================================================

/// Errors from the planner loop and agent sessions.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The event receiver was dropped; abort at the next suspension point.
    #[error("Planner stream cancelled by caller")]
    Cancelled,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Agent exceeded {0} turns without finishing")]
    TurnLimit(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// TOP-LEVEL ERROR
// ============================================================================

/// Top-level error type for the FlowForge CLI, wrapping the specific
/// error types from each module.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Executor(#[from] ExecutorError),

    #[error("{0}")]
    Planner(#[from] PlannerError),

    #[error("Workflow validation failed:\n{0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl FlowError {
    pub fn other(msg: impl Into<String>) -> Self {
        FlowError::Other(msg.into())
    }

    /// Get a fix suggestion for this error, if available.
    pub fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::Service(e) => match e.kind {
                ErrorKind::AuthError => Some("Check connector credentials in your environment"),
                ErrorKind::UnknownService => {
                    Some("Use a registered service: hr, google, slack, jira, github")
                }
                ErrorKind::UnknownAction => {
                    Some("Run `flowforge catalog <query>` to list valid service actions")
                }
                ErrorKind::PreconditionFailed => {
                    Some("Add the missing upstream node and a depends_on edge to it")
                }
                _ => None,
            },
            FlowError::Executor(ExecutorError::CycleDetected { .. }) => {
                Some("Remove one edge from the cycle; workflows must be acyclic")
            }
            FlowError::Validation(_) => {
                Some("Fix the listed validation errors, then re-run validation")
            }
            FlowError::Json(_) => Some("Check JSON syntax: quoting, commas, and brackets"),
            FlowError::Io(_) => Some("Check the file path exists and has correct permissions"),
            FlowError::Planner(_) | FlowError::Other(_) => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_wire_strings_round_trip() {
        let kinds = [
            ErrorKind::AuthError,
            ErrorKind::PermissionDenied,
            ErrorKind::NotFound,
            ErrorKind::AlreadyExists,
            ErrorKind::RateLimit,
            ErrorKind::UnknownService,
            ErrorKind::UnknownAction,
            ErrorKind::PreconditionFailed,
            ErrorKind::ConnectorError,
        ];
        for kind in kinds {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("nonsense"), None);
    }

    #[test]
    fn error_kind_from_status() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::AuthError);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::PermissionDenied);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::AlreadyExists);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ConnectorError);
    }

    #[test]
    fn service_error_display_is_message() {
        let err = ServiceError::precondition("No HR record found for Alice Chen");
        assert_eq!(err.to_string(), "No HR record found for Alice Chen");
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);
    }

    #[test]
    fn unknown_service_and_action_messages() {
        assert_eq!(
            ServiceError::unknown_service("zendesk").to_string(),
            "Unknown service: zendesk"
        );
        assert_eq!(
            ServiceError::unknown_action("slack", "teleport").to_string(),
            "Unknown action teleport for service slack"
        );
    }

    #[test]
    fn flow_error_wraps_service_error_with_suggestion() {
        let err: FlowError = ServiceError::unknown_service("x").into();
        assert!(err.fix_suggestion().unwrap().contains("registered service"));
    }

    #[test]
    fn cycle_error_has_suggestion() {
        let err: FlowError = ExecutorError::CycleDetected {
            nodes: vec!["a".into(), "b".into()],
        }
        .into();
        assert!(err.to_string().contains("Cycle detected"));
        assert!(err.to_string().contains("a, b"));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn error_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PreconditionFailed).unwrap();
        assert_eq!(json, "\"precondition_failed\"");
    }
}
