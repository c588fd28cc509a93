//! Prompt templates for the connector builder agent.

/// System prompt: the manifest contract the builder agent must satisfy.
pub fn builder_system_prompt(service_name: &str, workspace: &str) -> String {
    format!(
        r#"You are the FlowForge Connector Builder. Your sole task is to write a declarative
JSON connector manifest for a specific third-party service API and save it as connector.json
in your workspace.

## Mandatory manifest shape

The file must contain exactly one JSON object with these keys:

```json
{{
  "service_name": "{service_name}",
  "base_url": "https://api.example.com"      // or "base_url_env": "{env_prefix}_BASE_URL",
  "credentials": [
    {{"env": "{env_prefix}_API_KEY", "header": "Authorization", "format": "Bearer {{value}}"}}
  ],
  "actions": {{
    "action_name": {{
      "method": "POST",
      "path": "/v1/things",
      "body": {{"name": "{{param_name}}"}},
      "success_statuses": [200, 201],
      "result": {{"name": "{{param_name}}", "status": "created"}},
      "errors": {{"409": "already_exists", "429": "rate_limit"}}
    }}
  }}
}}
```

## Hard rules

- `service_name` must be exactly "{service_name}"
- Define one action entry per required action, with the exact action name
- `{{param}}` placeholders in path, body, and result refer to workflow node parameters
- Every `result` template must include a `"status"` key set to a past-tense verb
  (e.g. "created", "sent")
- `errors` values must be one of: "auth_error", "permission_denied", "not_found",
  "already_exists", "rate_limit", "connector_error"
- Credentials are environment variable references; never write secret values into the manifest
- The manifest is pure data. Do not write code in any language.

## Workflow
1. Use `search_apis` to look up any known patterns for this service
2. Write the manifest to `{workspace}/connector.json` using `write_file`
3. Verify it parses with `run_command`: python3 -c "import json; json.load(open('{workspace}/connector.json')); print('JSON OK')"
4. If the parse fails, fix the file and re-verify"#,
        env_prefix = service_name.to_uppercase(),
    )
}

/// User prompt: the concrete build request.
pub fn builder_user_prompt(
    service_name: &str,
    required_actions: &[String],
    workflow_context: &str,
    workspace: &str,
) -> String {
    let action_list = required_actions
        .iter()
        .map(|a| format!("  - {a}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Build a connector manifest for service: **{service_name}**

Required actions (exact names, define all of them):
{action_list}

Workflow context (for understanding what params look like at runtime):
{workflow_context}

Write the manifest to: {workspace}/connector.json
The service_name key must be: "{service_name}"

After writing, verify the file parses cleanly with run_command."#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_the_service_and_workspace() {
        let prompt = builder_system_prompt("zendesk", "/tmp/ws");
        assert!(prompt.contains("\"service_name\": \"zendesk\""));
        assert!(prompt.contains("ZENDESK_API_KEY"));
        assert!(prompt.contains("/tmp/ws/connector.json"));
        assert!(prompt.contains("pure data"));
    }

    #[test]
    fn user_prompt_lists_actions() {
        let prompt = builder_user_prompt(
            "zendesk",
            &["create_ticket".to_string(), "close_ticket".to_string()],
            "Workflow: Support Escalation",
            "/tmp/ws",
        );
        assert!(prompt.contains("  - create_ticket"));
        assert!(prompt.contains("  - close_ticket"));
        assert!(prompt.contains("Support Escalation"));
    }
}
