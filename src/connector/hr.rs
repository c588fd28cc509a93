//! HR system connector — generic configurable REST webhook.
//!
//! Required settings: `HR_BASE_URL`, `HR_API_KEY`.
//!
//! Expected endpoints (adapt to the HR system's actual shape):
//! - `POST {HR_BASE_URL}/employees` → create_employee
//! - `POST {HR_BASE_URL}/benefits/enroll` → enroll_benefits
//!
//! Each endpoint should return JSON with at least an `id` field.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::ServiceError;
use crate::result_map;
use crate::service::{param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::{log_success, status_error};

/// Real HR connector calling a configurable internal REST API.
pub struct HrConnector {
    base_url: String,
    api_key: String,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl HrConnector {
    pub fn from_settings(settings: &Settings, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        Self {
            base_url: settings
                .hr_base_url
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            api_key: settings.hr_api_key.clone().unwrap_or_default(),
            trace,
            http,
        }
    }

    pub fn is_configured(settings: &Settings) -> bool {
        settings.hr_base_url.is_some() && settings.hr_api_key.is_some()
    }

    async fn post(&self, path: &str, action: &str, payload: Value) -> Result<Value, ServiceError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("HR request failed: {e}")))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("hr", action, status, &body));
        }
        response
            .json()
            .await
            .map_err(|e| ServiceError::connector(format!("HR returned invalid JSON: {e}")))
    }

    async fn create_employee(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let body = self
            .post(
                "/employees",
                "create_employee",
                json!({
                    "name": param_str(params, "employee_name", ""),
                    "role": param_str(params, "role", ""),
                    "department": param_str(params, "department", ""),
                }),
            )
            .await?;

        let employee_id = body["id"]
            .as_str()
            .or_else(|| body["employee_id"].as_str())
            .unwrap_or_default()
            .to_string();
        let result = result_map! {
            "employee_id" => employee_id,
            "name" => param_str(params, "employee_name", ""),
            "status" => "created",
        };
        log_success(&self.trace, "hr", node_id, "create_employee", params, &result);
        Ok(result)
    }

    async fn enroll_benefits(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        self.post(
            "/benefits/enroll",
            "enroll_benefits",
            json!({
                "employee_id": param_str(params, "employee_id", ""),
                "plan": param_str(params, "plan", "standard"),
            }),
        )
        .await?;

        let result = result_map! {
            "employee_id" => param_str(params, "employee_id", ""),
            "plan" => param_str(params, "plan", "standard"),
            "status" => "enrolled",
        };
        log_success(&self.trace, "hr", node_id, "enroll_benefits", params, &result);
        Ok(result)
    }
}

#[async_trait]
impl Service for HrConnector {
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
            "create_employee" => self.create_employee(node_id, params).await,
            "enroll_benefits" => self.enroll_benefits(node_id, params).await,
            _ => Err(ServiceError::unknown_action("hr", action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_requires_both_settings() {
        let mut settings = Settings::simulator();
        assert!(!HrConnector::is_configured(&settings));
        settings.hr_base_url = Some("https://hr.internal/api".to_string());
        assert!(!HrConnector::is_configured(&settings));
        settings.hr_api_key = Some("secret".to_string());
        assert!(HrConnector::is_configured(&settings));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let mut settings = Settings::simulator();
        settings.hr_base_url = Some("https://hr.internal/api/".to_string());
        settings.hr_api_key = Some("secret".to_string());
        let connector =
            HrConnector::from_settings(&settings, ExecutionTrace::new(), reqwest::Client::new());
        assert_eq!(connector.base_url, "https://hr.internal/api");
    }

    #[test]
    fn exposes_hr_actions() {
        let connector = HrConnector::from_settings(
            &Settings::simulator(),
            ExecutionTrace::new(),
            reqwest::Client::new(),
        );
        assert_eq!(connector.name(), "hr");
        assert_eq!(connector.actions(), vec!["create_employee", "enroll_benefits"]);
    }
}
