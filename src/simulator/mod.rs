//! In-memory simulator for workflow execution.
//!
//! The simulator implements the five built-in services (`hr`, `google`,
//! `slack`, `jira`, `github`) against a process-local [`SimulatorState`].
//! Its design purpose is enforcing **cross-service preconditions**:
//! provisioning an identity requires an HR record, inviting to a channel
//! requires a provisioned identity, granting repository access requires
//! org membership. Violations surface as `precondition_failed` errors so
//! the planner can detect missing or mis-ordered nodes without real side
//! effects.
//!
//! State is created fresh per execution, mutated only by simulator
//! services, and discarded when the run ends.

mod failures;
mod services;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::service::ServiceMap;
use crate::trace::ExecutionTrace;

pub use failures::{FailureConfig, FailureRule};
pub use services::{GitHubService, GoogleService, HrService, JiraService, SlackService};

/// An employee record in the simulated HR portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A provisioned Google Workspace account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub name: String,
    pub status: String,
}

/// A GitHub org membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMemberRecord {
    pub username: String,
    pub org: String,
    pub role: String,
}

/// A Jira issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub status: String,
    pub assignee: Option<String>,
}

/// Mutable state shared across all simulated services for one run.
///
/// `slack_users` is a set in spirit; it serializes as a sorted,
/// deduplicated list so JSON round-trips are deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorState {
    /// Employees by generated id (EMP-XXXXXX).
    pub employees: BTreeMap<String, EmployeeRecord>,
    /// Provisioned accounts by email.
    pub google_accounts: BTreeMap<String, AccountRecord>,
    /// Channel name → member emails, in invite order.
    pub slack_channels: BTreeMap<String, Vec<String>>,
    pub slack_users: BTreeSet<String>,
    /// Org members by username.
    pub github_members: BTreeMap<String, OrgMemberRecord>,
    /// Issues by generated key (ONBOARD-XXXX).
    pub jira_issues: BTreeMap<String, IssueRecord>,
}

impl SimulatorState {
    /// True if any HR record matches this employee name.
    pub fn has_employee_named(&self, name: &str) -> bool {
        self.employees.values().any(|e| e.name == name)
    }
}

/// Shared handle to per-run simulator state.
pub type SharedState = Arc<Mutex<SimulatorState>>;

/// Create a fresh simulator: state, trace, and all five services wired
/// together.
pub fn create_simulator() -> (SharedState, ExecutionTrace, ServiceMap) {
    let state: SharedState = Arc::new(Mutex::new(SimulatorState::default()));
    let trace = ExecutionTrace::new();

    let entries: [(&str, Arc<dyn crate::service::Service>); 5] = [
        ("hr", Arc::new(HrService::new(Arc::clone(&state), trace.clone()))),
        ("google", Arc::new(GoogleService::new(Arc::clone(&state), trace.clone()))),
        ("slack", Arc::new(SlackService::new(Arc::clone(&state), trace.clone()))),
        ("jira", Arc::new(JiraService::new(Arc::clone(&state), trace.clone()))),
        ("github", Arc::new(GitHubService::new(Arc::clone(&state), trace.clone()))),
    ];
    let services: ServiceMap = entries
        .into_iter()
        .map(|(name, service)| (name.to_string(), service))
        .collect();

    (state, trace, services)
}
