//! Static validation for generated connector manifests.
//!
//! Manifests are data, not code, so validation is a structural pass over
//! the parsed JSON: the declared service name, the required actions, the
//! HTTP templates, and the error-kind names are all checked before the
//! registry will ever load the file.

use std::path::Path;

use crate::error::ErrorKind;

use super::super::custom::{load_manifest, ConnectorManifest};

const VALID_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Return a list of error strings. An empty list means the file is valid.
pub fn validate_manifest_file(
    path: &Path,
    service_name: &str,
    required_actions: &[String],
) -> Vec<String> {
    let manifest = match load_manifest(path, service_name) {
        Ok(manifest) => manifest,
        Err(error) => return vec![error],
    };
    validate_manifest(&manifest, required_actions)
}

/// Structural checks over a parsed manifest.
pub fn validate_manifest(manifest: &ConnectorManifest, required_actions: &[String]) -> Vec<String> {
    let mut errors = Vec::new();

    if manifest.base_url.is_none() && manifest.base_url_env.is_none() {
        errors.push("Manifest must declare base_url or base_url_env".to_string());
    }
    if let Some(base_url) = &manifest.base_url {
        if url::Url::parse(base_url).is_err() {
            errors.push(format!("Invalid base_url: '{base_url}'"));
        }
    }

    for action in required_actions {
        if !manifest.actions.contains_key(action) {
            errors.push(format!("Required action '{action}' not defined in manifest"));
        }
    }

    for (name, spec) in &manifest.actions {
        let method = spec.method.to_uppercase();
        if !VALID_METHODS.contains(&method.as_str()) {
            errors.push(format!("Action '{name}': invalid method '{}'", spec.method));
        }

        let path_ok = spec.path.starts_with('/')
            || ((spec.path.starts_with("http://") || spec.path.starts_with("https://"))
                && url::Url::parse(&spec.path).is_ok());
        if !path_ok {
            errors.push(format!(
                "Action '{name}': path must start with '/' or be a full http(s) URL"
            ));
        }

        if !spec.result.contains_key("status") {
            errors.push(format!("Action '{name}': result template must contain 'status'"));
        }

        for (status, kind) in &spec.errors {
            if status.parse::<u16>().is_err() {
                errors.push(format!("Action '{name}': error status '{status}' is not numeric"));
            }
            if ErrorKind::parse(kind).is_none() {
                errors.push(format!("Action '{name}': unknown error kind '{kind}'"));
            }
        }
    }

    for cred in &manifest.credentials {
        if cred.env.trim().is_empty() || cred.header.trim().is_empty() {
            errors.push("Credential entries need non-empty env and header".to_string());
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join(format!("{name}.json"));
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn valid_manifest() -> serde_json::Value {
        json!({
            "service_name": "zendesk",
            "base_url": "https://acme.zendesk.com",
            "credentials": [
                {"env": "ZENDESK_API_TOKEN", "header": "Authorization"}
            ],
            "actions": {
                "create_ticket": {
                    "method": "POST",
                    "path": "/api/v2/tickets",
                    "result": {"status": "created"},
                    "errors": {"409": "already_exists"}
                }
            }
        })
    }

    #[test]
    fn valid_manifest_passes() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", valid_manifest());
        let errors =
            validate_manifest_file(&path, "zendesk", &["create_ticket".to_string()]);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn unparseable_file_is_one_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zendesk.json");
        std::fs::write(&path, "{not json").unwrap();
        let errors = validate_manifest_file(&path, "zendesk", &[]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("parse error"));
    }

    #[test]
    fn missing_required_action_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", valid_manifest());
        let errors = validate_manifest_file(
            &path,
            "zendesk",
            &["create_ticket".to_string(), "close_ticket".to_string()],
        );
        assert!(errors.iter().any(|e| e.contains("close_ticket")));
    }

    #[test]
    fn invalid_method_and_path_are_reported() {
        let mut manifest = valid_manifest();
        manifest["actions"]["create_ticket"]["method"] = json!("FETCH");
        manifest["actions"]["create_ticket"]["path"] = json!("tickets");
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", manifest);

        let errors = validate_manifest_file(&path, "zendesk", &[]);
        assert!(errors.iter().any(|e| e.contains("invalid method")));
        assert!(errors.iter().any(|e| e.contains("path must start")));
    }

    #[test]
    fn result_without_status_is_reported() {
        let mut manifest = valid_manifest();
        manifest["actions"]["create_ticket"]["result"] = json!({"id": "{id}"});
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", manifest);

        let errors = validate_manifest_file(&path, "zendesk", &[]);
        assert!(errors.iter().any(|e| e.contains("must contain 'status'")));
    }

    #[test]
    fn unknown_error_kind_is_reported() {
        let mut manifest = valid_manifest();
        manifest["actions"]["create_ticket"]["errors"] = json!({"500": "explosion"});
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", manifest);

        let errors = validate_manifest_file(&path, "zendesk", &[]);
        assert!(errors.iter().any(|e| e.contains("unknown error kind")));
    }

    #[test]
    fn missing_base_url_is_reported() {
        let mut manifest = valid_manifest();
        manifest.as_object_mut().unwrap().remove("base_url");
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "zendesk", manifest);

        let errors = validate_manifest_file(&path, "zendesk", &[]);
        assert!(errors.iter().any(|e| e.contains("base_url")));
    }
}
