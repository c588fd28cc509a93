//! Application settings, loaded from environment variables.
//!
//! The CLI loads `.env` via dotenvy before reading these. All connector
//! credentials are optional; a connector missing its credentials is
//! simply "not configured" and excluded from the service map for the run
//! (hybrid mode falls back to the simulator service).

use std::path::PathBuf;
use std::str::FromStr;

/// How services are resolved for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorMode {
    /// Always use the in-memory simulator.
    #[default]
    Simulator,
    /// Per service: real connector when configured, simulator otherwise.
    Hybrid,
    /// Same resolution as hybrid; callers inspect the returned service
    /// map to verify no simulator entries remain.
    Real,
}

impl FromStr for ConnectorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulator" => Ok(ConnectorMode::Simulator),
            "hybrid" => Ok(ConnectorMode::Hybrid),
            "real" => Ok(ConnectorMode::Real),
            other => Err(format!(
                "Unknown connector mode '{other}'. Use: simulator, hybrid, real"
            )),
        }
    }
}

impl std::fmt::Display for ConnectorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorMode::Simulator => write!(f, "simulator"),
            ConnectorMode::Hybrid => write!(f, "hybrid"),
            ConnectorMode::Real => write!(f, "real"),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Model identifier for the planner agent.
    pub model: String,
    pub connector_mode: ConnectorMode,

    /// Root directory for persisted workflows.
    pub workflow_dir: Option<PathBuf>,
    /// Knowledge-base root (contains `default/` plus team directories).
    pub kb_dir: Option<PathBuf>,
    /// Directory holding generated connector manifests.
    pub custom_connector_dir: Option<PathBuf>,

    // LM transport
    pub anthropic_api_key: Option<String>,

    // HR webhook
    pub hr_base_url: Option<String>,
    pub hr_api_key: Option<String>,

    // Google Workspace service account
    pub google_service_account_json: Option<String>,
    pub google_admin_email: Option<String>,
    pub google_domain: Option<String>,

    // Slack
    pub slack_bot_token: Option<String>,

    // Jira Cloud
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    pub jira_project_key: Option<String>,

    // GitHub
    pub github_token: Option<String>,
    pub github_org: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self {
            model: env_opt("FLOWFORGE_MODEL").unwrap_or_else(|| "haiku".to_string()),
            connector_mode: env_opt("FLOWFORGE_CONNECTOR_MODE")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            workflow_dir: env_opt("FLOWFORGE_WORKFLOW_DIR").map(PathBuf::from),
            kb_dir: env_opt("FLOWFORGE_KB_DIR").map(PathBuf::from),
            custom_connector_dir: env_opt("FLOWFORGE_CUSTOM_CONNECTOR_DIR").map(PathBuf::from),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            hr_base_url: env_opt("HR_BASE_URL"),
            hr_api_key: env_opt("HR_API_KEY"),
            google_service_account_json: env_opt("GOOGLE_SERVICE_ACCOUNT_JSON"),
            google_admin_email: env_opt("GOOGLE_ADMIN_EMAIL"),
            google_domain: env_opt("GOOGLE_DOMAIN"),
            slack_bot_token: env_opt("SLACK_BOT_TOKEN"),
            jira_base_url: env_opt("JIRA_BASE_URL"),
            jira_email: env_opt("JIRA_EMAIL"),
            jira_api_token: env_opt("JIRA_API_TOKEN"),
            jira_project_key: env_opt("JIRA_PROJECT_KEY"),
            github_token: env_opt("GITHUB_TOKEN"),
            github_org: env_opt("GITHUB_ORG"),
        }
    }

    /// Settings for tests and offline runs: simulator mode, default model.
    pub fn simulator() -> Self {
        Self {
            model: "haiku".to_string(),
            connector_mode: ConnectorMode::Simulator,
            ..Default::default()
        }
    }
}
