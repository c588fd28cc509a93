//! Planner pipeline: prompt → agent → parse → execute → self-correct.
//!
//! States: DRAFTING → PARSING → EXECUTING → (DONE | REPAIRING → PARSING).
//!
//! The loop runs in its own task and streams [`PlannerEvent`]s; dropping
//! the receiving stream cancels it at the next suspension point. Service
//! calls are never retried directly; retries happen only by regenerating
//! the workflow, bounded by [`MAX_FIX_ATTEMPTS`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::agent::{run_agent, AgentConfig, ToolRegistry};
use crate::config::Settings;
use crate::connector::builder::build_connector;
use crate::connector::{create_service_layer, custom_connector_dir};
use crate::error::{FlowError, PlannerError};
use crate::event::{EventSender, PlannerEvent};
use crate::executor::WorkflowExecutor;
use crate::provider::{create_provider, Provider};
use crate::service::ServiceMap;
use crate::store::WorkflowStore;
use crate::validator::Validator;
use crate::workflow::Workflow;

/// Repair attempts beyond the initial draft.
pub const MAX_FIX_ATTEMPTS: u32 = 2;

const DRAFT_MAX_TURNS: usize = 30;
const REPAIR_MAX_TURNS: usize = 10;

const SYSTEM_PROMPT: &str = r#"You are FlowForge, an AI automation assistant.

You can converse with users, gather requirements, and produce executable workflow DAGs.
When asked to design or modify a workflow, write valid JSON to `workflow.json` using the `write_file` tool.

## Available tools
- file tools: read_file, write_file, edit_file
- execution: run_command (runs shell commands in the workspace; use for inspecting files, running scripts, validating data — avoid destructive or network-accessing commands)
- discovery tools: search_apis, search_knowledge_base

## Workflow JSON contract
- Root keys: id, name, description, team, nodes, edges, parameters, version
- Every node must include: id, name, description, service, action, actor, parameters, depends_on, outputs
- Use {{param_name}} for global parameters
- Use {{node_id.output_key}} for upstream outputs
- edges must mirror depends_on relationships

## Design guidance
- Use search_knowledge_base to find required policy/process steps
- Use search_apis to validate service/action/parameter choices
- Keep dependencies valid and deterministic
- Always return at least one short natural-language text response per turn
"#;

const SCHEMA_DESCRIPTION: &str = r#"The workflow JSON must conform to this schema:

```json
{
  "id": "string — unique workflow identifier (kebab-case)",
  "name": "string — human-readable name",
  "description": "string — what this workflow accomplishes",
  "team": "string — team whose KB was used (e.g., 'default', 'engineering')",
  "nodes": [
    {
      "id": "string — unique node ID (snake_case)",
      "name": "string — display name",
      "description": "string — what this step does",
      "service": "string — one of: slack, jira, google, hr, github",
      "action": "string — service method to call, e.g., create_channel, send_message, provision_account, create_employee, add_to_org, grant_repo_access, create_issue, create_epic, assign_issue, invite_user, send_email, create_calendar_event, enroll_benefits",
      "actor": "string — responsible role: hr_manager, it_admin, team_lead, new_employee",
      "parameters": [
        {
          "name": "string — parameter name matching the service action",
          "value": "any — the value; use {{param_name}} for global params, {{node_id.output_key}} for upstream outputs",
          "description": "string — human-readable description",
          "required": true
        }
      ],
      "depends_on": ["list of node IDs this step depends on"],
      "outputs": {"output_name": "description of what this output contains"}
    }
  ],
  "edges": [
    {"source": "node_id", "target": "node_id"}
  ],
  "parameters": {
    "employee_name": "Alice Chen",
    "role": "Software Engineer"
  },
  "version": 1
}
```
"#;

const EXAMPLE_WORKFLOW_JSON: &str = r##"{
  "id": "day1-onboarding",
  "name": "Day 1 Onboarding",
  "description": "Provisions all accounts and sends welcome materials for a new hire's first day",
  "team": "default",
  "nodes": [
    {
      "id": "create_hr_record",
      "name": "Create Employee Record",
      "description": "Create the employee's HR record in the HR Portal",
      "service": "hr",
      "action": "create_employee",
      "actor": "hr_manager",
      "parameters": [
        {"name": "employee_name", "value": "{{employee_name}}", "description": "Full name of the new employee", "required": true},
        {"name": "role", "value": "{{role}}", "description": "Job title", "required": true},
        {"name": "department", "value": "{{department}}", "description": "Department", "required": false}
      ],
      "depends_on": [],
      "outputs": {"employee_id": "The created employee ID"}
    },
    {
      "id": "provision_google",
      "name": "Provision Google Workspace",
      "description": "Create Google Workspace account for email, calendar, and drive",
      "service": "google",
      "action": "provision_account",
      "actor": "it_admin",
      "parameters": [
        {"name": "employee_name", "value": "{{employee_name}}", "description": "Full name", "required": true},
        {"name": "email", "value": "", "description": "Work email (derived when empty)", "required": false}
      ],
      "depends_on": ["create_hr_record"],
      "outputs": {"email": "The provisioned email address"}
    },
    {
      "id": "invite_slack",
      "name": "Invite to Slack",
      "description": "Create Slack account and invite to required channels",
      "service": "slack",
      "action": "invite_user",
      "actor": "it_admin",
      "parameters": [
        {"name": "email", "value": "{{provision_google.email}}", "description": "User's email for Slack invite", "required": true},
        {"name": "channel_name", "value": "#general", "description": "Channel to invite to", "required": true}
      ],
      "depends_on": ["provision_google"],
      "outputs": {}
    }
  ],
  "edges": [
    {"source": "create_hr_record", "target": "provision_google"},
    {"source": "provision_google", "target": "invite_slack"}
  ],
  "parameters": {
    "employee_name": "Alice Chen",
    "role": "Software Engineer",
    "department": "Engineering"
  },
  "version": 1
}"##;

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Natural-language description of what the workflow should do.
    pub description: String,
    /// Optional key/value context appended to the prompt.
    pub context: BTreeMap<String, String>,
    pub team: String,
    /// When modifying, the current workflow; the agent increments the
    /// version.
    pub existing_workflow: Option<Workflow>,
}

impl GenerateRequest {
    pub fn new(description: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            team: team.into(),
            ..Default::default()
        }
    }
}

/// Generates, executes, and repairs workflows from natural language.
#[derive(Clone)]
pub struct Planner {
    settings: Settings,
    provider: Arc<dyn Provider>,
    store: Option<WorkflowStore>,
}

impl Planner {
    /// Production planner using the Claude provider.
    pub fn new(settings: Settings) -> Result<Self, FlowError> {
        let provider = create_provider("claude", &settings)
            .map_err(|e| FlowError::other(e.to_string()))?;
        Ok(Self {
            settings,
            provider: Arc::from(provider),
            store: None,
        })
    }

    /// Planner with an injected provider (tests, alternative transports).
    pub fn with_provider(settings: Settings, provider: Arc<dyn Provider>) -> Self {
        Self {
            settings,
            provider,
            store: None,
        }
    }

    /// Persist clean workflows into this store.
    pub fn with_store(mut self, store: WorkflowStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Generate or modify a workflow. Returns the event stream; the loop
    /// runs until DONE, a terminal error, or the stream is dropped.
    pub fn generate(&self, request: GenerateRequest) -> ReceiverStream<PlannerEvent> {
        let (tx, rx) = mpsc::channel(256);
        let events = EventSender::new(tx);
        let planner = self.clone();

        tokio::spawn(async move {
            match planner.run(request, &events).await {
                Ok(()) | Err(PlannerError::Cancelled) => {}
                Err(error) => {
                    let _ = events.error(error.to_string()).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run(&self, request: GenerateRequest, events: &EventSender) -> Result<(), PlannerError> {
        // Ephemeral workspace; removed on every exit path when the guard
        // drops.
        let workspace = tempfile::Builder::new().prefix("flowforge-").tempdir()?;
        let workflow_file = workspace.path().join("workflow.json");

        let result = self
            .run_in_workspace(&request, workspace.path(), &workflow_file, events)
            .await;

        // Terminal workspace event on every path, cancellation aside.
        if !matches!(&result, Err(PlannerError::Cancelled)) {
            let _ = events
                .send(PlannerEvent::Workspace {
                    path: workspace.path().to_path_buf(),
                })
                .await;
        }
        result
    }

    async fn run_in_workspace(
        &self,
        request: &GenerateRequest,
        workspace: &Path,
        workflow_file: &Path,
        events: &EventSender,
    ) -> Result<(), PlannerError> {
        let tools = ToolRegistry::new(workspace, &request.team, self.settings.kb_dir.clone());
        let draft_config = AgentConfig::new(SYSTEM_PROMPT, &self.settings.model, DRAFT_MAX_TURNS);
        let repair_config = AgentConfig::new(SYSTEM_PROMPT, &self.settings.model, REPAIR_MAX_TURNS);

        // DRAFTING
        let prompt = build_prompt(workspace, request);
        match run_agent(&*self.provider, &draft_config, prompt, &tools, events).await {
            Ok(_) => {}
            Err(PlannerError::Cancelled) => return Err(PlannerError::Cancelled),
            Err(error) => {
                events
                    .error(format!("Agent failed during workflow generation: {error}"))
                    .await?;
                return Ok(());
            }
        }

        if !workflow_file.exists() {
            events.error("Agent did not produce workflow.json").await?;
            return Ok(());
        }

        let mut final_workflow: Option<Workflow> = None;
        let mut final_report = None;

        for attempt_idx in 0..=MAX_FIX_ATTEMPTS {
            let attempt = attempt_idx + 1;

            // PARSING
            let workflow = match parse_and_validate(workflow_file) {
                Ok(workflow) => workflow,
                Err(parse_error) => {
                    events
                        .error(format!(
                            "Failed to parse workflow.json (attempt {attempt}): {parse_error}"
                        ))
                        .await?;
                    if attempt_idx >= MAX_FIX_ATTEMPTS {
                        break;
                    }

                    // REPAIRING: hand the parser error back to the agent.
                    let prompt = format!(
                        "The workflow.json file at {} failed to parse with the following \
                         error:\n\n{parse_error}\n\nRead the file, fix the JSON, and write it back.",
                        workflow_file.display()
                    );
                    match run_agent(&*self.provider, &repair_config, prompt, &tools, events).await {
                        Ok(_) => continue,
                        Err(PlannerError::Cancelled) => return Err(PlannerError::Cancelled),
                        Err(error) => {
                            events
                                .error(format!(
                                    "Self-correction agent failed while fixing parse error \
                                     (attempt {attempt}): {error}"
                                ))
                                .await?;
                            break;
                        }
                    }
                }
            };

            final_workflow = Some(workflow.clone());
            events.send(PlannerEvent::Workflow(workflow.clone())).await?;

            // EXECUTING: assemble services, building connectors for any
            // service the workflow references but the layer lacks.
            let mut layer = create_service_layer(&self.settings);
            let missing = collect_missing_services(&workflow, &layer.services);
            if !missing.is_empty() {
                let custom_dir = custom_connector_dir(&self.settings);
                for (service_name, actions) in &missing {
                    let context = format!(
                        "Workflow: {}\nActions needed: {}",
                        workflow.name,
                        actions.join(", ")
                    );
                    build_connector(
                        &*self.provider,
                        &self.settings,
                        service_name,
                        actions,
                        &context,
                        &request.team,
                        &custom_dir,
                        events,
                    )
                    .await?;
                }
                // Reload so new connectors are included.
                layer = create_service_layer(&self.settings);
            }

            let mut executor = WorkflowExecutor::new(layer.services, layer.trace.clone(), None);
            let report = match executor.execute(&workflow).await {
                Ok(report) => report,
                Err(fatal) => {
                    events.error(fatal.to_string()).await?;
                    break;
                }
            };
            let markdown = report.to_markdown();
            events
                .send(PlannerEvent::ExecutionReport {
                    report: report.clone(),
                    markdown: markdown.clone(),
                    attempt,
                })
                .await?;
            let failed = report.failed;
            final_report = Some(report);

            if failed == 0 || attempt_idx >= MAX_FIX_ATTEMPTS {
                break;
            }

            // REPAIRING: feed the execution report back to the agent.
            events
                .text(format!(
                    "Execution had {failed} failure(s). Running self-correction \
                     (attempt {attempt}/{MAX_FIX_ATTEMPTS})..."
                ))
                .await?;
            let prompt = format!(
                "The workflow at {} was executed but had failures.\n\n\
                 ## Execution Report\n\n{markdown}\n\n\
                 Read the workflow.json, fix the issues described above, and write the \
                 corrected file back.",
                workflow_file.display()
            );
            match run_agent(&*self.provider, &repair_config, prompt, &tools, events).await {
                Ok(_) => {}
                Err(PlannerError::Cancelled) => return Err(PlannerError::Cancelled),
                Err(error) => {
                    events
                        .error(format!(
                            "Self-correction agent failed while fixing execution failures \
                             (attempt {attempt}): {error}"
                        ))
                        .await?;
                    break;
                }
            }
        }

        // DONE: persist only clean runs.
        if let (Some(store), Some(workflow)) = (&self.store, &final_workflow) {
            let clean = final_report.as_ref().map(|r| r.failed == 0).unwrap_or(false);
            if clean {
                match store.save(workflow) {
                    Ok(_) => {
                        info!(workflow_id = %workflow.id, version = workflow.version, "workflow saved");
                        events
                            .send(PlannerEvent::WorkflowSaved {
                                workflow_id: workflow.id.clone(),
                                team: workflow.team.clone(),
                                version: workflow.version,
                            })
                            .await?;
                    }
                    Err(error) => {
                        events
                            .error(format!("Failed to save workflow: {error}"))
                            .await?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Parse the artifact and validate it against the workflow schema.
fn parse_and_validate(workflow_file: &Path) -> Result<Workflow, String> {
    let raw = std::fs::read_to_string(workflow_file).map_err(|e| e.to_string())?;
    let workflow = Workflow::from_json(&raw).map_err(|e| e.to_string())?;
    let result = Validator::new().validate(&workflow);
    if !result.is_valid() {
        return Err(result.render_errors());
    }
    Ok(workflow)
}

/// `{service_name: [action, ...]}` for services the workflow references
/// but the service map lacks.
fn collect_missing_services(
    workflow: &Workflow,
    services: &ServiceMap,
) -> BTreeMap<String, Vec<String>> {
    workflow
        .actions_by_service()
        .into_iter()
        .filter(|(service, _)| !services.contains_key(*service))
        .map(|(service, actions)| {
            let mut actions: Vec<String> = actions.into_iter().map(str::to_string).collect();
            actions.sort();
            (service.to_string(), actions)
        })
        .collect()
}

/// Build the drafting prompt: workspace, schema, example, request.
fn build_prompt(workspace: &Path, request: &GenerateRequest) -> String {
    let mut prompt = format!(
        "Your workspace directory is: {workspace}\n\
         Write all files there using absolute paths (e.g., {workspace}/workflow.json).\n\n\
         Workflow schema reference:\n{SCHEMA_DESCRIPTION}\n\n\
         Example workflow JSON:\n{EXAMPLE_WORKFLOW_JSON}\n\n",
        workspace = workspace.display(),
    );

    if let Some(existing) = &request.existing_workflow {
        prompt.push_str(&format!(
            "Modify this existing workflow based on the user request below.\n\
             Current workflow:\n{}\n\n\
             Update workflow.json and increment version by 1.\n\n",
            existing.to_json_pretty()
        ));
    } else {
        prompt.push_str("Design a workflow DAG for this request and write workflow.json.\n\n");
    }

    prompt.push_str(&format!(
        "<user_request>\n{}\n</user_request>",
        request.description
    ));

    if !request.context.is_empty() {
        prompt.push_str("\n\n<user_context>\n");
        for (key, value) in &request.context {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
        prompt.push_str("</user_context>\n");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prompt_fresh_workflow() {
        let request = GenerateRequest::new("Onboard Alice Chen", "default");
        let prompt = build_prompt(Path::new("/tmp/ws"), &request);
        assert!(prompt.contains("Your workspace directory is: /tmp/ws"));
        assert!(prompt.contains("Design a workflow DAG"));
        assert!(prompt.contains("<user_request>\nOnboard Alice Chen\n</user_request>"));
        assert!(!prompt.contains("Modify this existing workflow"));
    }

    #[test]
    fn build_prompt_with_existing_workflow_and_context() {
        let mut request = GenerateRequest::new("Add a Jira epic", "default");
        request.existing_workflow = Some(Workflow {
            id: "day1-onboarding".to_string(),
            name: "Day 1".to_string(),
            description: String::new(),
            team: "default".to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            parameters: Default::default(),
            version: 1,
        });
        request
            .context
            .insert("employee_name".to_string(), "Alice Chen".to_string());

        let prompt = build_prompt(Path::new("/tmp/ws"), &request);
        assert!(prompt.contains("Modify this existing workflow"));
        assert!(prompt.contains("increment version by 1"));
        assert!(prompt.contains("- employee_name: Alice Chen"));
    }

    #[test]
    fn collect_missing_services_groups_actions() {
        let json = serde_json::json!({
            "id": "x", "name": "X", "description": "", "team": "default",
            "nodes": [
                {"id": "a", "name": "", "description": "", "service": "zendesk",
                 "action": "create_ticket", "actor": "it_admin", "parameters": [],
                 "depends_on": [], "outputs": {}},
                {"id": "b", "name": "", "description": "", "service": "zendesk",
                 "action": "close_ticket", "actor": "it_admin", "parameters": [],
                 "depends_on": [], "outputs": {}},
                {"id": "c", "name": "", "description": "", "service": "hr",
                 "action": "create_employee", "actor": "hr_manager", "parameters": [],
                 "depends_on": [], "outputs": {}}
            ],
            "edges": [], "parameters": {}, "version": 1
        });
        let workflow: Workflow = serde_json::from_value(json).unwrap();
        let (_state, _trace, services) = crate::simulator::create_simulator();

        let missing = collect_missing_services(&workflow, &services);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["zendesk"], vec!["close_ticket", "create_ticket"]);
    }

    #[test]
    fn parse_and_validate_rejects_invalid_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("workflow.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(parse_and_validate(&path).is_err());

        // Valid JSON, invalid workflow (bad id).
        std::fs::write(
            &path,
            serde_json::json!({
                "id": "Bad Id", "name": "X", "description": "", "team": "default",
                "nodes": [], "edges": [], "parameters": {}, "version": 1
            })
            .to_string(),
        )
        .unwrap();
        let err = parse_and_validate(&path).unwrap_err();
        assert!(err.contains("kebab-case"));
    }
}
