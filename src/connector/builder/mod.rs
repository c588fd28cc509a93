//! Connector builder: generates a manifest for an unknown service.
//!
//! Flow:
//! 1. refuse unsafe service names;
//! 2. run a focused agent session in a scratch workspace with the
//!    standard tool surface;
//! 3. expect `connector.json` in the workspace;
//! 4. statically validate it ([`validator`]);
//! 5. if valid, copy it atomically into the custom-connector directory
//!    and emit `connector_built`.
//!
//! Invalid or missing files are reported as `error` events and the
//! service falls back to the simulator for the current run.

mod prompts;
pub mod validator;

use std::path::Path;

use tracing::info;

use crate::agent::{run_agent, AgentConfig, ToolRegistry};
use crate::config::Settings;
use crate::error::PlannerError;
use crate::event::{EventSender, PlannerEvent};
use crate::provider::Provider;

use super::registry::is_safe_service_name;

const BUILDER_MAX_TURNS: usize = 15;

/// Run the connector builder and persist the validated manifest.
///
/// Returns `Ok(true)` when a manifest was built and persisted; `Ok(false)`
/// when the build failed non-fatally (the caller falls back to the
/// simulator). Only cancellation propagates as an error.
#[allow(clippy::too_many_arguments)]
pub async fn build_connector(
    provider: &dyn Provider,
    settings: &Settings,
    service_name: &str,
    required_actions: &[String],
    workflow_context: &str,
    team: &str,
    custom_dir: &Path,
    events: &EventSender,
) -> Result<bool, PlannerError> {
    if !is_safe_service_name(service_name) {
        events
            .error(format!(
                "Refusing to build connector for invalid service name '{service_name}'. \
                 Use only letters, numbers, and underscores."
            ))
            .await?;
        return Ok(false);
    }

    let workspace = tempfile::Builder::new()
        .prefix("connector-build-")
        .tempdir()?;
    let manifest_file = workspace.path().join("connector.json");

    events
        .text(format!(
            "No connector found for service '{service_name}'. Building one automatically..."
        ))
        .await?;

    let workspace_str = workspace.path().display().to_string();
    let config = AgentConfig::new(
        prompts::builder_system_prompt(service_name, &workspace_str),
        settings.model.clone(),
        BUILDER_MAX_TURNS,
    );
    let tools = ToolRegistry::new(workspace.path(), team, settings.kb_dir.clone());
    let prompt = prompts::builder_user_prompt(
        service_name,
        required_actions,
        workflow_context,
        &workspace_str,
    );

    match run_agent(provider, &config, prompt, &tools, events).await {
        Ok(_) => {}
        Err(PlannerError::Cancelled) => return Err(PlannerError::Cancelled),
        Err(error) => {
            events
                .error(format!(
                    "Connector builder failed for '{service_name}': {error}"
                ))
                .await?;
            return Ok(false);
        }
    }

    if !manifest_file.exists() {
        events
            .error(format!(
                "Builder agent did not produce connector.json for '{service_name}'. \
                 The service will fall back to the simulator."
            ))
            .await?;
        return Ok(false);
    }

    let errors = validator::validate_manifest_file(&manifest_file, service_name, required_actions);
    if !errors.is_empty() {
        events
            .error(format!(
                "Connector validation failed for '{service_name}': {}. \
                 The service will fall back to the simulator.",
                errors.join("; ")
            ))
            .await?;
        return Ok(false);
    }

    // Persist atomically: write next to the destination, then rename.
    let dest = custom_dir.join(format!("{service_name}.json"));
    let staged = custom_dir.join(format!(".{service_name}.json.tmp"));
    let persist = || -> std::io::Result<()> {
        std::fs::create_dir_all(custom_dir)?;
        std::fs::copy(&manifest_file, &staged)?;
        std::fs::rename(&staged, &dest)?;
        Ok(())
    };
    if let Err(error) = persist() {
        events
            .error(format!(
                "Failed to persist connector for '{service_name}': {error}"
            ))
            .await?;
        return Ok(false);
    }
    info!(service = service_name, path = %dest.display(), "custom connector persisted");

    events
        .send(PlannerEvent::ConnectorBuilt {
            service: service_name.to_string(),
            path: dest,
            actions: required_actions.to_vec(),
        })
        .await?;
    events
        .text(format!(
            "Connector for '{service_name}' built and saved successfully. \
             Resuming workflow execution..."
        ))
        .await?;

    Ok(true)
}
