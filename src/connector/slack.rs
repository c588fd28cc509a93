//! Slack Web API connector.
//!
//! Required settings: `SLACK_BOT_TOKEN` (xoxb-...).
//! Scopes needed: channels:manage, chat:write, users:read, users:read.email

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::{ErrorKind, ServiceError};
use crate::result_map;
use crate::service::{param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::log_success;

const SLACK_API: &str = "https://slack.com/api";

/// Real Slack connector using the Slack Web API.
pub struct SlackConnector {
    bot_token: String,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl SlackConnector {
    pub fn from_settings(settings: &Settings, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        Self {
            bot_token: settings.slack_bot_token.clone().unwrap_or_default(),
            trace,
            http,
        }
    }

    pub fn is_configured(settings: &Settings) -> bool {
        settings.slack_bot_token.is_some()
    }

    async fn post(&self, method: &str, payload: Value) -> Result<Value, ServiceError> {
        let response = self
            .http
            .post(format!("{SLACK_API}/{method}"))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Slack request failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::connector(format!("Slack returned invalid JSON: {e}")))
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<Value, ServiceError> {
        let response = self
            .http
            .get(format!("{SLACK_API}/{method}"))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Slack request failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::connector(format!("Slack returned invalid JSON: {e}")))
    }

    /// Map Slack error codes into the common taxonomy.
    fn map_error(error_code: &str) -> ServiceError {
        let (message, kind) = match error_code {
            "name_taken" => ("Channel already exists".to_string(), ErrorKind::AlreadyExists),
            "ratelimited" => ("Slack rate limit hit".to_string(), ErrorKind::RateLimit),
            "not_in_channel" => (
                "Bot is not in the channel".to_string(),
                ErrorKind::PermissionDenied,
            ),
            "channel_not_found" => ("Channel not found".to_string(), ErrorKind::NotFound),
            "missing_scope" => (
                "Bot missing required Slack scope".to_string(),
                ErrorKind::PermissionDenied,
            ),
            other => (
                format!("Slack API error: {other}"),
                ErrorKind::ConnectorError,
            ),
        };
        ServiceError::new(kind, message)
    }

    /// Look up a channel ID by name, paginating if necessary.
    async fn find_channel_id(&self, channel_name: &str) -> Result<String, ServiceError> {
        let mut cursor = String::new();
        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel"),
                ("limit", "200"),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let data = self.get("conversations.list", &query).await?;

            for channel in data["channels"].as_array().into_iter().flatten() {
                if channel["name"].as_str() == Some(channel_name) {
                    if let Some(id) = channel["id"].as_str() {
                        return Ok(id.to_string());
                    }
                }
            }

            match data["response_metadata"]["next_cursor"].as_str() {
                Some(next) if !next.is_empty() => cursor = next.to_string(),
                _ => break,
            }
        }
        Err(ServiceError::new(
            ErrorKind::NotFound,
            format!("Slack channel #{channel_name} not found"),
        ))
    }

    async fn create_channel(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let channel_name = param_str(params, "channel_name", "")
            .trim_start_matches('#')
            .to_string();
        let data = self
            .post(
                "conversations.create",
                json!({"name": channel_name, "is_private": false}),
            )
            .await?;
        if data["ok"] != json!(true) {
            return Err(Self::map_error(data["error"].as_str().unwrap_or("unknown")));
        }

        let result = result_map! {
            "channel" => format!("#{channel_name}"),
            "channel_id" => data["channel"]["id"].as_str().unwrap_or_default(),
            "status" => "created",
        };
        log_success(&self.trace, "slack", node_id, "create_channel", params, &result);
        Ok(result)
    }

    async fn invite_user(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let email = param_str(params, "email", "");
        let channel_name = param_str(params, "channel_name", "")
            .trim_start_matches('#')
            .to_string();

        // Resolve email → Slack user ID.
        let data = self
            .get("users.lookupByEmail", &[("email", email)])
            .await?;
        if data["ok"] != json!(true) {
            return Err(ServiceError::new(
                ErrorKind::NotFound,
                format!(
                    "No Slack user found for {email}: {}",
                    data["error"].as_str().unwrap_or("unknown")
                ),
            ));
        }
        let user_id = data["user"]["id"].as_str().unwrap_or_default().to_string();

        let channel_id = self.find_channel_id(&channel_name).await?;

        let data = self
            .post(
                "conversations.invite",
                json!({"channel": channel_id, "users": user_id}),
            )
            .await?;
        if data["ok"] != json!(true) && data["error"].as_str() != Some("already_in_channel") {
            return Err(Self::map_error(data["error"].as_str().unwrap_or("unknown")));
        }

        let result = result_map! {
            "email" => email,
            "channel" => format!("#{channel_name}"),
            "status" => "invited",
        };
        log_success(&self.trace, "slack", node_id, "invite_user", params, &result);
        Ok(result)
    }

    async fn send_message(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let channel_name = param_str(params, "channel_name", "")
            .trim_start_matches('#')
            .to_string();
        let message = param_str(params, "message", "");

        let data = self
            .post(
                "chat.postMessage",
                json!({"channel": format!("#{channel_name}"), "text": message}),
            )
            .await?;
        if data["ok"] != json!(true) {
            return Err(Self::map_error(data["error"].as_str().unwrap_or("unknown")));
        }

        let result = result_map! {
            "channel" => format!("#{channel_name}"),
            "message" => message,
            "status" => "sent",
        };
        log_success(&self.trace, "slack", node_id, "send_message", params, &result);
        Ok(result)
    }
}

#[async_trait]
impl Service for SlackConnector {
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
            "create_channel" => self.create_channel(node_id, params).await,
            "invite_user" => self.invite_user(node_id, params).await,
            "send_message" => self.send_message(node_id, params).await,
            _ => Err(ServiceError::unknown_action("slack", action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_requires_bot_token() {
        let mut settings = Settings::simulator();
        assert!(!SlackConnector::is_configured(&settings));
        settings.slack_bot_token = Some("xoxb-test".to_string());
        assert!(SlackConnector::is_configured(&settings));
    }

    #[test]
    fn slack_error_codes_map_to_taxonomy() {
        assert_eq!(
            SlackConnector::map_error("name_taken").kind,
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            SlackConnector::map_error("ratelimited").kind,
            ErrorKind::RateLimit
        );
        assert_eq!(
            SlackConnector::map_error("missing_scope").kind,
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            SlackConnector::map_error("channel_not_found").kind,
            ErrorKind::NotFound
        );
        let unknown = SlackConnector::map_error("weird_code");
        assert_eq!(unknown.kind, ErrorKind::ConnectorError);
        assert!(unknown.message.contains("weird_code"));
    }

    #[test]
    fn exposes_slack_actions() {
        let connector = SlackConnector::from_settings(
            &Settings::simulator(),
            ExecutionTrace::new(),
            reqwest::Client::new(),
        );
        assert_eq!(connector.name(), "slack");
        assert_eq!(
            connector.actions(),
            vec!["create_channel", "invite_user", "send_message"]
        );
    }
}
