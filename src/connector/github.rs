//! GitHub REST API connector.
//!
//! Required settings: `GITHUB_TOKEN`, `GITHUB_ORG`.
//! Token needs admin:org and repo scopes (or a GitHub App installation
//! token).

use async_trait::async_trait;
use serde_json::json;

use crate::config::Settings;
use crate::error::{ErrorKind, ServiceError};
use crate::result_map;
use crate::service::{param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::{log_success, status_error};

const GH_API: &str = "https://api.github.com";
const GH_ACCEPT: &str = "application/vnd.github+json";
const GH_API_VERSION: &str = "2022-11-28";

/// Real GitHub connector using the GitHub REST API.
pub struct GithubConnector {
    token: String,
    default_org: String,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl GithubConnector {
    pub fn from_settings(settings: &Settings, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        Self {
            token: settings.github_token.clone().unwrap_or_default(),
            default_org: settings.github_org.clone().unwrap_or_default(),
            trace,
            http,
        }
    }

    pub fn is_configured(settings: &Settings) -> bool {
        settings.github_token.is_some() && settings.github_org.is_some()
    }

    async fn put(&self, url: String, payload: serde_json::Value) -> Result<u16, ServiceError> {
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .header("Accept", GH_ACCEPT)
            .header("X-GitHub-Api-Version", GH_API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("GitHub request failed: {e}")))?;
        Ok(response.status().as_u16())
    }

    async fn add_to_org(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let username = param_str(params, "username", "");
        let org = param_str(params, "org", &self.default_org).to_string();

        let status = self
            .put(
                format!("{GH_API}/orgs/{org}/memberships/{username}"),
                json!({"role": "member"}),
            )
            .await?;
        match status {
            200 | 201 => {}
            403 => {
                return Err(ServiceError::new(
                    ErrorKind::PermissionDenied,
                    "Insufficient GitHub org permissions",
                ))
            }
            404 => {
                return Err(ServiceError::new(
                    ErrorKind::NotFound,
                    format!("GitHub org '{org}' or user '{username}' not found"),
                ))
            }
            other => return Err(status_error("github", "add_to_org", other, "")),
        }

        let result = result_map! {
            "username" => username,
            "org" => org,
            "status" => "added",
        };
        log_success(&self.trace, "github", node_id, "add_to_org", params, &result);
        Ok(result)
    }

    async fn grant_repo_access(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let username = param_str(params, "username", "");
        let repo = param_str(params, "repo", "");
        // GitHub uses pull/push/admin; map the catalog's read/write.
        let raw_permission = param_str(params, "permission", "read");
        let permission = match raw_permission {
            "read" => "pull",
            "write" => "push",
            other => other,
        };
        let org = &self.default_org;

        let status = self
            .put(
                format!("{GH_API}/repos/{org}/{repo}/collaborators/{username}"),
                json!({"permission": permission}),
            )
            .await?;
        match status {
            // 201 = invitation sent, 204 = already a collaborator.
            200 | 201 | 204 => {}
            403 => {
                return Err(ServiceError::new(
                    ErrorKind::PermissionDenied,
                    "Insufficient GitHub repo permissions",
                ))
            }
            404 => {
                return Err(ServiceError::new(
                    ErrorKind::NotFound,
                    format!("GitHub repo '{org}/{repo}' or user '{username}' not found"),
                ))
            }
            other => return Err(status_error("github", "grant_repo_access", other, "")),
        }

        let result = result_map! {
            "username" => username,
            "repo" => repo,
            "permission" => raw_permission,
            "status" => "granted",
        };
        log_success(
            &self.trace,
            "github",
            node_id,
            "grant_repo_access",
            params,
            &result,
        );
        Ok(result)
    }
}

#[async_trait]
impl Service for GithubConnector {
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
            "add_to_org" => self.add_to_org(node_id, params).await,
            "grant_repo_access" => self.grant_repo_access(node_id, params).await,
            _ => Err(ServiceError::unknown_action("github", action)),
        }
    }
}
