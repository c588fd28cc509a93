//! Jira Cloud REST API v3 connector.
//!
//! Required settings: `JIRA_BASE_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`.
//! Optional: `JIRA_PROJECT_KEY` (defaults to "ONBOARD").

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::ServiceError;
use crate::result_map;
use crate::service::{param_opt, param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::{log_success, status_error};

/// Real Jira connector using the Jira Cloud REST API v3.
pub struct JiraConnector {
    base_url: String,
    auth_header: String,
    project_key: String,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl JiraConnector {
    pub fn from_settings(settings: &Settings, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        let email = settings.jira_email.clone().unwrap_or_default();
        let token = settings.jira_api_token.clone().unwrap_or_default();
        let creds = base64::engine::general_purpose::STANDARD.encode(format!("{email}:{token}"));
        Self {
            base_url: settings
                .jira_base_url
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            auth_header: format!("Basic {creds}"),
            project_key: settings
                .jira_project_key
                .clone()
                .unwrap_or_else(|| "ONBOARD".to_string()),
            trace,
            http,
        }
    }

    pub fn is_configured(settings: &Settings) -> bool {
        settings.jira_base_url.is_some()
            && settings.jira_email.is_some()
            && settings.jira_api_token.is_some()
    }

    async fn create_issue_with_type(
        &self,
        node_id: &str,
        action: &str,
        params: &Params,
        issue_type: &str,
    ) -> Result<Params, ServiceError> {
        let mut fields = json!({
            "project": {"key": self.project_key},
            "summary": param_str(params, "summary", ""),
            "issuetype": {"name": issue_type},
        });
        if let Some(assignee) = param_opt(params, "assignee") {
            // Jira Cloud v3 uses accountId for assignee.
            fields["assignee"] = json!({"accountId": assignee});
        }

        let response = self
            .http
            .post(format!("{}/rest/api/3/issue", self.base_url))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .json(&json!({"fields": fields}))
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Jira request failed: {e}")))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("jira", action, status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::connector(format!("Jira returned invalid JSON: {e}")))?;
        let issue_key = body["key"].as_str().unwrap_or_default().to_string();

        let result = result_map! {
            "issue_key" => issue_key,
            "summary" => param_str(params, "summary", ""),
            "status" => "created",
        };
        log_success(&self.trace, "jira", node_id, action, params, &result);
        Ok(result)
    }

    async fn assign_issue(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let issue_key = param_str(params, "issue_key", "");
        let assignee = param_str(params, "assignee", "");

        let response = self
            .http
            .put(format!(
                "{}/rest/api/3/issue/{issue_key}/assignee",
                self.base_url
            ))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .json(&json!({"accountId": assignee}))
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Jira request failed: {e}")))?;

        // 204 = success, no body.
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("jira", "assign_issue", status, &body));
        }

        let result = result_map! {
            "issue_key" => issue_key,
            "assignee" => assignee,
            "status" => "assigned",
        };
        log_success(&self.trace, "jira", node_id, "assign_issue", params, &result);
        Ok(result)
    }
}

#[async_trait]
impl Service for JiraConnector {
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
                    .await
            }
            "create_epic" => {
                self.create_issue_with_type(node_id, "create_epic", params, "Epic")
                    .await
            }
            "assign_issue" => self.assign_issue(node_id, params).await,
            _ => Err(ServiceError::unknown_action("jira", action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_requires_all_three_settings() {
        let mut settings = Settings::simulator();
        assert!(!JiraConnector::is_configured(&settings));
        settings.jira_base_url = Some("https://acme.atlassian.net".to_string());
        settings.jira_email = Some("bot@acme.com".to_string());
        assert!(!JiraConnector::is_configured(&settings));
        settings.jira_api_token = Some("token".to_string());
        assert!(JiraConnector::is_configured(&settings));
    }

    #[test]
    fn project_key_defaults_to_onboard() {
        let connector = JiraConnector::from_settings(
            &Settings::simulator(),
            ExecutionTrace::new(),
            reqwest::Client::new(),
        );
        assert_eq!(connector.project_key, "ONBOARD");
    }

    #[test]
    fn basic_auth_header_encodes_credentials() {
        let mut settings = Settings::simulator();
        settings.jira_email = Some("bot@acme.com".to_string());
        settings.jira_api_token = Some("secret".to_string());
        let connector =
            JiraConnector::from_settings(&settings, ExecutionTrace::new(), reqwest::Client::new());

        let expected =
            base64::engine::general_purpose::STANDARD.encode("bot@acme.com:secret");
        assert_eq!(connector.auth_header, format!("Basic {expected}"));
    }

    #[test]
    fn exposes_jira_actions() {
        let connector = JiraConnector::from_settings(
            &Settings::simulator(),
            ExecutionTrace::new(),
            reqwest::Client::new(),
        );
        assert_eq!(
            connector.actions(),
            vec!["create_issue", "create_epic", "assign_issue"]
        );
    }
}
