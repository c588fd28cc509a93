//! Simulated service backends.
//!
//! Each service holds a shared handle to the run's [`SimulatorState`] and
//! trace. Actions mutate state synchronously, append a success trace step,
//! and return a result map with a past-tense `status`. Preconditions are
//! checked against prior state and raise `precondition_failed`.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ServiceError;
use crate::result_map;
use crate::service::{param_list, param_opt, param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::{AccountRecord, EmployeeRecord, IssueRecord, OrgMemberRecord, SharedState};

/// Short uppercase hex suffix for generated entity ids.
fn id_suffix(len: usize) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..len].to_uppercase()
}

/// Default company email for an employee name: "Alice Chen" →
/// "alice.chen@company.com".
fn default_email(employee_name: &str) -> String {
    format!(
        "{}@company.com",
        employee_name.trim().to_lowercase().replace(' ', ".")
    )
}

// ============================================================================
// HR
// ============================================================================

/// Simulated HR portal.
pub struct HrService {
    state: SharedState,
    trace: ExecutionTrace,
}

impl HrService {
    pub fn new(state: SharedState, trace: ExecutionTrace) -> Self {
        Self { state, trace }
    }

    fn create_employee(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let employee_name = param_str(params, "employee_name", "Unknown");
        let role = param_str(params, "role", "Employee");
        let department = param_str(params, "department", "General");
        let employee_id = format!("EMP-{}", id_suffix(6));

        self.state.lock().employees.insert(
            employee_id.clone(),
            EmployeeRecord {
                id: employee_id.clone(),
                name: employee_name.to_string(),
                role: role.to_string(),
                department: department.to_string(),
                status: "active".to_string(),
                created_at: Utc::now(),
            },
        );

        let result = result_map! {
            "employee_id" => employee_id,
            "name" => employee_name,
            "status" => "created",
        };
        self.trace
            .record_success(node_id, "hr", "create_employee", params.clone(), result.clone());
        Ok(result)
    }

    fn enroll_benefits(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        if let Some(employee_id) = param_opt(params, "employee_id") {
            if !self.state.lock().employees.contains_key(employee_id) {
                return Err(ServiceError::precondition(format!(
                    "Employee {employee_id} not found — create HR record first"
                )));
            }
        }

        let employee_id = param_str(params, "employee_id", "");
        let plan = param_str(params, "plan", "standard");
        let result = result_map! {
            "employee_id" => employee_id,
            "plan" => plan,
            "status" => "enrolled",
        };
        self.trace
            .record_success(node_id, "hr", "enroll_benefits", params.clone(), result.clone());
        Ok(result)
    }
}

#[async_trait]
impl Service for HrService {
    fn name(&self) -> &str {
        "hr"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["create_employee", "enroll_benefits"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "create_employee" => self.create_employee(node_id, params),
            "enroll_benefits" => self.enroll_benefits(node_id, params),
            _ => Err(ServiceError::unknown_action("hr", action)),
        }
    }
}

// ============================================================================
// GOOGLE
// ============================================================================

/// Simulated Google Workspace.
pub struct GoogleService {
    state: SharedState,
    trace: ExecutionTrace,
}

impl GoogleService {
    pub fn new(state: SharedState, trace: ExecutionTrace) -> Self {
        Self { state, trace }
    }

    fn provision_account(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let employee_name = param_str(params, "employee_name", "Unknown");

        let mut state = self.state.lock();
        if !state.has_employee_named(employee_name) {
            return Err(ServiceError::precondition(format!(
                "No HR record found for {employee_name} — create employee record first"
            )));
        }

        let email = param_opt(params, "email")
            .map(str::to_string)
            .unwrap_or_else(|| default_email(employee_name));
        state.google_accounts.insert(
            email.clone(),
            AccountRecord {
                email: email.clone(),
                name: employee_name.to_string(),
                status: "active".to_string(),
            },
        );
        drop(state);

        let result = result_map! {
            "email" => email,
            "status" => "provisioned",
        };
        self.trace.record_success(
            node_id,
            "google",
            "provision_account",
            params.clone(),
            result.clone(),
        );
        Ok(result)
    }

    fn send_email(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let result = result_map! {
            "to" => param_str(params, "to", ""),
            "subject" => param_str(params, "subject", ""),
            "status" => "sent",
        };
        self.trace
            .record_success(node_id, "google", "send_email", params.clone(), result.clone());
        Ok(result)
    }

    fn create_calendar_event(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let result = result_map! {
            "title" => param_str(params, "title", "Meeting"),
            "attendees" => param_list(params, "attendees"),
            "status" => "created",
        };
        self.trace.record_success(
            node_id,
            "google",
            "create_calendar_event",
            params.clone(),
            result.clone(),
        );
        Ok(result)
    }
}

#[async_trait]
impl Service for GoogleService {
    fn name(&self) -> &str {
        "google"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["provision_account", "send_email", "create_calendar_event"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "provision_account" => self.provision_account(node_id, params),
            "send_email" => self.send_email(node_id, params),
            "create_calendar_event" => self.create_calendar_event(node_id, params),
            _ => Err(ServiceError::unknown_action("google", action)),
        }
    }
}

// ============================================================================
// SLACK
// ============================================================================

/// Simulated Slack workspace.
pub struct SlackService {
    state: SharedState,
    trace: ExecutionTrace,
}

impl SlackService {
    pub fn new(state: SharedState, trace: ExecutionTrace) -> Self {
        Self { state, trace }
    }

    fn create_channel(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let channel_name = param_str(params, "channel_name", "#general");
        self.state
            .lock()
            .slack_channels
            .insert(channel_name.to_string(), Vec::new());

        let result = result_map! {
            "channel" => channel_name,
            "status" => "created",
        };
        self.trace
            .record_success(node_id, "slack", "create_channel", params.clone(), result.clone());
        Ok(result)
    }

    fn invite_user(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let email = param_str(params, "email", "");
        let channel_name = param_str(params, "channel_name", "#general");

        let mut state = self.state.lock();
        if !email.is_empty() && !state.google_accounts.contains_key(email) {
            return Err(ServiceError::precondition(format!(
                "No Google account found for {email} — provision account first"
            )));
        }

        state.slack_users.insert(email.to_string());
        if let Some(members) = state.slack_channels.get_mut(channel_name) {
            members.push(email.to_string());
        }
        drop(state);

        let result = result_map! {
            "email" => email,
            "channel" => channel_name,
            "status" => "invited",
        };
        self.trace
            .record_success(node_id, "slack", "invite_user", params.clone(), result.clone());
        Ok(result)
    }

    fn send_message(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let result = result_map! {
            "channel" => param_str(params, "channel_name", "#general"),
            "message" => param_str(params, "message", ""),
            "status" => "sent",
        };
        self.trace
            .record_success(node_id, "slack", "send_message", params.clone(), result.clone());
        Ok(result)
    }
}

#[async_trait]
impl Service for SlackService {
    fn name(&self) -> &str {
        "slack"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["create_channel", "invite_user", "send_message"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "create_channel" => self.create_channel(node_id, params),
            "invite_user" => self.invite_user(node_id, params),
            "send_message" => self.send_message(node_id, params),
            _ => Err(ServiceError::unknown_action("slack", action)),
        }
    }
}

// ============================================================================
// JIRA
// ============================================================================

/// Simulated Jira project.
pub struct JiraService {
    state: SharedState,
    trace: ExecutionTrace,
}

impl JiraService {
    pub fn new(state: SharedState, trace: ExecutionTrace) -> Self {
        Self { state, trace }
    }

    fn create_issue_with_type(
        &self,
        node_id: &str,
        action: &str,
        params: &Params,
        issue_type: &str,
    ) -> Result<Params, ServiceError> {
        let issue_key = format!("ONBOARD-{}", id_suffix(4));
        let summary = param_str(params, "summary", "");

        self.state.lock().jira_issues.insert(
            issue_key.clone(),
            IssueRecord {
                key: issue_key.clone(),
                summary: summary.to_string(),
                issue_type: issue_type.to_string(),
                status: "To Do".to_string(),
                assignee: param_opt(params, "assignee").map(str::to_string),
            },
        );

        let result = result_map! {
            "issue_key" => issue_key,
            "summary" => summary,
            "status" => "created",
        };
        self.trace
            .record_success(node_id, "jira", action, params.clone(), result.clone());
        Ok(result)
    }

    fn assign_issue(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let issue_key = param_str(params, "issue_key", "");
        let assignee = param_str(params, "assignee", "");

        if !issue_key.is_empty() {
            if let Some(issue) = self.state.lock().jira_issues.get_mut(issue_key) {
                issue.assignee = Some(assignee.to_string());
            }
        }

        let result = result_map! {
            "issue_key" => issue_key,
            "assignee" => assignee,
            "status" => "assigned",
        };
        self.trace
            .record_success(node_id, "jira", "assign_issue", params.clone(), result.clone());
        Ok(result)
    }
}

#[async_trait]
impl Service for JiraService {
    fn name(&self) -> &str {
        "jira"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["create_issue", "create_epic", "assign_issue"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "create_issue" => {
                let issue_type = param_str(params, "issue_type", "Task").to_string();
                self.create_issue_with_type(node_id, "create_issue", params, &issue_type)
            }
            "create_epic" => self.create_issue_with_type(node_id, "create_epic", params, "Epic"),
            "assign_issue" => self.assign_issue(node_id, params),
            _ => Err(ServiceError::unknown_action("jira", action)),
        }
    }
}

// ============================================================================
// GITHUB
// ============================================================================

/// Simulated GitHub organization.
pub struct GitHubService {
    state: SharedState,
    trace: ExecutionTrace,
}

impl GitHubService {
    pub fn new(state: SharedState, trace: ExecutionTrace) -> Self {
        Self { state, trace }
    }

    fn add_to_org(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let username = param_str(params, "username", "");
        let org = param_str(params, "org", "techcorp");

        let mut state = self.state.lock();
        if let Some(employee_name) = param_opt(params, "employee_name") {
            if !state.has_employee_named(employee_name) {
                return Err(ServiceError::precondition(format!(
                    "No HR record found for {employee_name} — create employee record first"
                )));
            }
        }

        state.github_members.insert(
            username.to_string(),
            OrgMemberRecord {
                username: username.to_string(),
                org: org.to_string(),
                role: "member".to_string(),
            },
        );
        drop(state);

        let result = result_map! {
            "username" => username,
            "org" => org,
            "status" => "added",
        };
        self.trace
            .record_success(node_id, "github", "add_to_org", params.clone(), result.clone());
        Ok(result)
    }

    fn grant_repo_access(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let username = param_str(params, "username", "");
        let repo = param_str(params, "repo", "");

        if !username.is_empty() && !self.state.lock().github_members.contains_key(username) {
            return Err(ServiceError::precondition(format!(
                "{username} is not in the org — add to org first"
            )));
        }

        let permission = param_str(params, "permission", "read");
        let result = result_map! {
            "username" => username,
            "repo" => repo,
            "permission" => permission,
            "status" => "granted",
        };
        self.trace.record_success(
            node_id,
            "github",
            "grant_repo_access",
            params.clone(),
            result.clone(),
        );
        Ok(result)
    }
}

#[async_trait]
impl Service for GitHubService {
    fn name(&self) -> &str {
        "github"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["add_to_org", "grant_repo_access"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "add_to_org" => self.add_to_org(node_id, params),
            "grant_repo_access" => self.grant_repo_access(node_id, params),
            _ => Err(ServiceError::unknown_action("github", action)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
