//! Manifest-driven custom connectors.
//!
//! Generated connectors are declarative JSON manifests interpreted by a
//! generic HTTP connector; loading one never executes code. A manifest
//! names its service, its credential environment variables, and one HTTP
//! template per action. `{param}` placeholders in paths, bodies, and
//! result templates are substituted from the node's resolved parameters.
//!
//! Example manifest (`custom_connectors/zendesk.json`):
//!
//! ```json
//! {
//!   "service_name": "zendesk",
//!   "base_url_env": "ZENDESK_BASE_URL",
//!   "credentials": [
//!     {"env": "ZENDESK_API_TOKEN", "header": "Authorization",
//!      "format": "Bearer {value}"}
//!   ],
//!   "actions": {
//!     "create_ticket": {
//!       "method": "POST",
//!       "path": "/api/v2/tickets",
//!       "body": {"ticket": {"subject": "{subject}"}},
//!       "success_statuses": [200, 201],
//!       "result": {"subject": "{subject}", "status": "created"},
//!       "errors": {"409": "already_exists"}
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, ServiceError};
use crate::service::{Params, Service};
use crate::trace::ExecutionTrace;

use super::log_success;

/// One credential requirement: an env var injected as a request header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub env: String,
    pub header: String,
    /// Header value template; `{value}` is replaced with the env value.
    #[serde(default = "default_credential_format")]
    pub format: String,
}

fn default_credential_format() -> String {
    "{value}".to_string()
}

/// HTTP template for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub method: String,
    /// Request path relative to the base URL, or a full http(s) URL.
    pub path: String,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default = "default_success_statuses")]
    pub success_statuses: Vec<u16>,
    /// Result template; must contain a `status` key.
    pub result: serde_json::Map<String, Value>,
    /// Status code (as string) → error kind overrides.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

fn default_success_statuses() -> Vec<u16> {
    vec![200, 201, 204]
}

/// A validated connector manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorManifest {
    pub service_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub base_url_env: Option<String>,
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,
    pub actions: BTreeMap<String, ActionSpec>,
}

impl ConnectorManifest {
    /// True when every credential env var (and the base-url env var, if
    /// used) is present in the environment.
    pub fn is_configured(&self) -> bool {
        let base_ok = match (&self.base_url, &self.base_url_env) {
            (Some(_), _) => true,
            (None, Some(env)) => std::env::var(env).map(|v| !v.is_empty()).unwrap_or(false),
            (None, None) => false,
        };
        base_ok
            && self.credentials.iter().all(|cred| {
                std::env::var(&cred.env)
                    .map(|v| !v.is_empty())
                    .unwrap_or(false)
            })
    }

    fn resolve_base_url(&self) -> Result<String, ServiceError> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        if let Some(env) = &self.base_url_env {
            return std::env::var(env)
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| {
                    ServiceError::new(
                        ErrorKind::AuthError,
                        format!("{} is not set for service {}", env, self.service_name),
                    )
                });
        }
        Err(ServiceError::connector(format!(
            "Manifest for {} declares no base URL",
            self.service_name
        )))
    }
}

/// Parse and structurally check a manifest file. The stem of the file
/// must match the declared service name.
pub fn load_manifest(path: &Path, service_name: &str) -> Result<ConnectorManifest, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("Cannot read manifest: {e}"))?;
    let manifest: ConnectorManifest =
        serde_json::from_str(&raw).map_err(|e| format!("Manifest parse error: {e}"))?;
    if manifest.service_name != service_name {
        return Err(format!(
            "Manifest service_name '{}' does not match '{}'",
            manifest.service_name, service_name
        ));
    }
    if manifest.actions.is_empty() {
        return Err("Manifest defines no actions".to_string());
    }
    Ok(manifest)
}

/// Substitute `{param}` placeholders from the parameter bag.
fn substitute(template: &str, params: &Params) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        let needle = format!("{{{key}}}");
        if out.contains(&needle) {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&needle, &rendered);
        }
    }
    out
}

/// Recursively substitute placeholders in every string of a JSON value.
fn substitute_value(value: &Value, params: &Params) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, params)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute_value(v, params)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Generic connector interpreting a validated manifest.
pub struct CustomConnector {
    manifest: ConnectorManifest,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl CustomConnector {
    pub fn new(manifest: ConnectorManifest, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        Self {
            manifest,
            trace,
            http,
        }
    }

    fn build_result(&self, spec: &ActionSpec, params: &Params) -> Params {
        let mut result: Params = spec
            .result
            .iter()
            .map(|(k, v)| (k.clone(), substitute_value(v, params)))
            .collect();
        result
            .entry("status".to_string())
            .or_insert_with(|| Value::String("completed".to_string()));
        result
    }

    async fn invoke(
        &self,
        action: &str,
        spec: &ActionSpec,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        let path = substitute(&spec.path, params);
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}{path}", self.manifest.resolve_base_url()?)
        };

        let method = reqwest::Method::from_bytes(spec.method.to_uppercase().as_bytes())
            .map_err(|_| {
                ServiceError::connector(format!("Invalid method '{}' in manifest", spec.method))
            })?;
        let mut request = self.http.request(method, url);

        for cred in &self.manifest.credentials {
            let value = std::env::var(&cred.env).map_err(|_| {
                ServiceError::new(
                    ErrorKind::AuthError,
                    format!("{} is not set for service {}", cred.env, self.manifest.service_name),
                )
            })?;
            request = request.header(&cred.header, cred.format.replace("{value}", &value));
        }

        if let Some(body) = &spec.body {
            request = request.json(&substitute_value(body, params));
        }

        let response = request.send().await.map_err(|e| {
            ServiceError::connector(format!("{} request failed: {e}", self.manifest.service_name))
        })?;

        let status = response.status().as_u16();
        if !spec.success_statuses.contains(&status) {
            let kind = spec
                .errors
                .get(&status.to_string())
                .and_then(|name| ErrorKind::parse(name))
                .unwrap_or_else(|| ErrorKind::from_status(status));
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(ServiceError::new(
                kind,
                format!(
                    "{} {action} failed ({status}): {snippet}",
                    self.manifest.service_name
                ),
            ));
        }

        let result = self.build_result(spec, params);
        log_success(
            &self.trace,
            &self.manifest.service_name,
            node_id,
            action,
            params,
            &result,
        );
        Ok(result)
    }
}

#[async_trait]
impl Service for CustomConnector {
    fn name(&self) -> &str {
        &self.manifest.service_name
    }

    fn actions(&self) -> Vec<&str> {
        self.manifest.actions.keys().map(String::as_str).collect()
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        let Some(spec) = self.manifest.actions.get(action) else {
            return Err(ServiceError::unknown_action(
                &self.manifest.service_name,
                action,
            ));
        };
        self.invoke(action, spec, node_id, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_manifest_json() -> Value {
        json!({
            "service_name": "zendesk",
            "base_url": "https://acme.zendesk.com",
            "credentials": [
                {"env": "ZENDESK_API_TOKEN", "header": "Authorization",
                 "format": "Bearer {value}"}
            ],
            "actions": {
                "create_ticket": {
                    "method": "POST",
                    "path": "/api/v2/tickets",
                    "body": {"ticket": {"subject": "{subject}"}},
                    "result": {"subject": "{subject}", "status": "created"},
                    "errors": {"409": "already_exists"}
                }
            }
        })
    }

    #[test]
    fn load_manifest_checks_service_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zendesk.json");
        std::fs::write(&path, sample_manifest_json().to_string()).unwrap();

        assert!(load_manifest(&path, "zendesk").is_ok());
        let err = load_manifest(&path, "other").unwrap_err();
        assert!(err.contains("does not match"));
    }

    #[test]
    fn load_manifest_rejects_empty_actions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(
            &path,
            json!({"service_name": "empty", "base_url": "https://x", "actions": {}}).to_string(),
        )
        .unwrap();
        assert!(load_manifest(&path, "empty").unwrap_err().contains("no actions"));
    }

    #[test]
    fn substitution_replaces_placeholders() {
        let mut params = Params::new();
        params.insert("subject".into(), json!("Laptop request"));
        params.insert("count".into(), json!(2));

        assert_eq!(
            substitute("/tickets/{subject}/{count}", &params),
            "/tickets/Laptop request/2"
        );
        let body = substitute_value(
            &json!({"ticket": {"subject": "{subject}", "tags": ["{subject}"]}}),
            &params,
        );
        assert_eq!(body["ticket"]["subject"], "Laptop request");
        assert_eq!(body["ticket"]["tags"][0], "Laptop request");
    }

    #[test]
    fn unmatched_placeholders_stay_intact() {
        let params = Params::new();
        assert_eq!(substitute("/tickets/{missing}", &params), "/tickets/{missing}");
    }

    #[test]
    fn is_configured_checks_env() {
        let manifest: ConnectorManifest =
            serde_json::from_value(sample_manifest_json()).unwrap();
        std::env::remove_var("ZENDESK_API_TOKEN");
        assert!(!manifest.is_configured());
        std::env::set_var("ZENDESK_API_TOKEN", "tok");
        assert!(manifest.is_configured());
        std::env::remove_var("ZENDESK_API_TOKEN");
    }

    #[test]
    fn result_template_always_has_status() {
        let manifest: ConnectorManifest = serde_json::from_value(json!({
            "service_name": "x",
            "base_url": "https://x",
            "actions": {
                "ping": {"method": "GET", "path": "/ping", "result": {"ok": "yes"}}
            }
        }))
        .unwrap();
        let connector =
            CustomConnector::new(manifest, ExecutionTrace::new(), reqwest::Client::new());
        let spec = connector.manifest.actions["ping"].clone();
        let result = connector.build_result(&spec, &Params::new());
        assert_eq!(result["status"], "completed");
    }

    #[tokio::test]
    async fn unknown_action_is_typed() {
        let manifest: ConnectorManifest =
            serde_json::from_value(sample_manifest_json()).unwrap();
        let connector =
            CustomConnector::new(manifest, ExecutionTrace::new(), reqwest::Client::new());
        let err = connector
            .call("escalate", "n1", &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownAction);
    }

    #[test]
    fn default_success_statuses_cover_no_content() {
        let manifest: ConnectorManifest =
            serde_json::from_value(sample_manifest_json()).unwrap();
        let spec = &manifest.actions["create_ticket"];
        assert_eq!(spec.success_statuses, vec![200, 201, 204]);
    }
}
