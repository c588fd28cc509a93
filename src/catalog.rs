//! Static API catalog: the service actions the planner may use, with
//! parameter schemas and auth notes. Searched by keyword overlap from the
//! `search_apis` tool.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

/// One catalog entry: a `(service, action)` pair with its parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEntry {
    pub service: &'static str,
    pub action: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ApiParam>,
    pub auth: &'static str,
    #[serde(skip)]
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiParam {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    pub required: bool,
}

const fn param(name: &'static str) -> ApiParam {
    ApiParam {
        name,
        param_type: "string",
        required: true,
    }
}

const fn opt_param(name: &'static str) -> ApiParam {
    ApiParam {
        name,
        param_type: "string",
        required: false,
    }
}

/// The full catalog, one entry per service action.
pub static API_CATALOG: Lazy<Vec<ApiEntry>> = Lazy::new(|| {
    vec![
        // --- HR ---
        ApiEntry {
            service: "hr",
            action: "create_employee",
            description: "Create a new employee record in the HR Portal",
            parameters: vec![param("employee_name"), param("role"), opt_param("department")],
            auth: "Internal SSO",
            keywords: &["hire", "onboard", "new hire", "employee", "hr record", "personnel"],
        },
        ApiEntry {
            service: "hr",
            action: "enroll_benefits",
            description: "Enroll an employee in benefits (health, dental, 401k)",
            parameters: vec![param("employee_id"), opt_param("plan")],
            auth: "Internal SSO",
            keywords: &["benefits", "health", "dental", "401k", "insurance", "enrollment"],
        },
        // --- Google Workspace ---
        ApiEntry {
            service: "google",
            action: "provision_account",
            description: "Provision a Google Workspace account (email, calendar, drive)",
            parameters: vec![param("employee_name"), opt_param("email")],
            auth: "Service account (OAuth2)",
            keywords: &[
                "google", "email", "workspace", "account", "provision", "gmail", "calendar",
                "drive",
            ],
        },
        ApiEntry {
            service: "google",
            action: "send_email",
            description: "Send an email via Google Workspace",
            parameters: vec![param("to"), param("subject"), opt_param("body")],
            auth: "Service account (OAuth2)",
            keywords: &["email", "send", "mail", "message", "notification", "welcome"],
        },
        ApiEntry {
            service: "google",
            action: "create_calendar_event",
            description: "Create a calendar event in Google Calendar",
            parameters: vec![param("title"), opt_param("attendees"), opt_param("date")],
            auth: "Service account (OAuth2)",
            keywords: &["calendar", "event", "meeting", "schedule", "invite", "appointment"],
        },
        // --- Slack ---
        ApiEntry {
            service: "slack",
            action: "create_channel",
            description: "Create a new Slack channel",
            parameters: vec![param("channel_name")],
            auth: "Bot token (OAuth2)",
            keywords: &["slack", "channel", "create", "messaging", "chat"],
        },
        ApiEntry {
            service: "slack",
            action: "invite_user",
            description: "Invite a user to a Slack channel",
            parameters: vec![param("email"), param("channel_name")],
            auth: "Bot token (OAuth2)",
            keywords: &["slack", "invite", "user", "channel", "add", "onboard"],
        },
        ApiEntry {
            service: "slack",
            action: "send_message",
            description: "Send a message to a Slack channel",
            parameters: vec![param("channel_name"), param("message")],
            auth: "Bot token (OAuth2)",
            keywords: &["slack", "message", "send", "notify", "announcement", "post"],
        },
        // --- Jira ---
        ApiEntry {
            service: "jira",
            action: "create_issue",
            description: "Create a Jira issue (task, bug, story)",
            parameters: vec![param("summary"), opt_param("issue_type"), opt_param("assignee")],
            auth: "API token (Basic Auth)",
            keywords: &["jira", "issue", "task", "ticket", "bug", "story", "create"],
        },
        ApiEntry {
            service: "jira",
            action: "create_epic",
            description: "Create a Jira epic for grouping related tasks",
            parameters: vec![param("summary"), opt_param("assignee")],
            auth: "API token (Basic Auth)",
            keywords: &["jira", "epic", "project", "group", "sprint", "onboarding"],
        },
        ApiEntry {
            service: "jira",
            action: "assign_issue",
            description: "Assign a Jira issue to a user",
            parameters: vec![param("issue_key"), param("assignee")],
            auth: "API token (Basic Auth)",
            keywords: &["jira", "assign", "issue", "task", "delegate"],
        },
        // --- GitHub ---
        ApiEntry {
            service: "github",
            action: "add_to_org",
            description: "Add a user to the GitHub organization",
            parameters: vec![param("username"), opt_param("employee_name"), opt_param("org")],
            auth: "GitHub App (JWT)",
            keywords: &["github", "org", "organization", "add", "member", "team"],
        },
        ApiEntry {
            service: "github",
            action: "grant_repo_access",
            description: "Grant a user access to a GitHub repository",
            parameters: vec![param("username"), param("repo"), opt_param("permission")],
            auth: "GitHub App (JWT)",
            keywords: &["github", "repo", "repository", "access", "permission", "code"],
        },
    ]
});

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

fn tokenize(text: &str) -> std::collections::HashSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Search the catalog by keyword overlap with the query tokens.
/// Empty queries return the head of the catalog.
pub fn search_api_catalog(query: &str, top_k: usize) -> Vec<&'static ApiEntry> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return API_CATALOG.iter().take(top_k).collect();
    }

    let mut scored: Vec<(usize, usize, &ApiEntry)> = API_CATALOG
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let mut entry_tokens = tokenize(entry.description);
            entry_tokens.extend(tokenize(&entry.keywords.join(" ")));
            entry_tokens.extend(tokenize(entry.service));
            entry_tokens.extend(tokenize(entry.action));

            let overlap = query_tokens.intersection(&entry_tokens).count();
            (overlap > 0).then_some((overlap, idx, entry))
        })
        .collect();

    // Highest overlap first; catalog order breaks ties.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(top_k).map(|(_, _, e)| e).collect()
}

/// JSON rendering for the `search_apis` tool result.
pub fn search_results_json(query: &str, top_k: usize) -> Value {
    json!(search_api_catalog(query, top_k))
}
