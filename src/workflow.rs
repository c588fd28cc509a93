//! Core workflow types: [`Workflow`], [`WorkflowNode`], [`NodeParameter`],
//! [`WorkflowEdge`].
//!
//! A workflow is a directed acyclic graph of nodes, each invoking one
//! action on one service. Dependencies are declared per node via
//! `depends_on`; the `edges` list mirrors those dependencies explicitly
//! so that visual tooling does not need to re-derive them.
//!
//! ## JSON contract
//!
//! | Key | Type | Notes |
//! |-----|------|-------|
//! | `id` | string | kebab-case workflow identifier |
//! | `name` | string | human-readable name |
//! | `description` | string | what the workflow accomplishes |
//! | `team` | string | team whose knowledge base was used |
//! | `nodes` | array | see [`WorkflowNode`] |
//! | `edges` | array | `{source, target}` pairs mirroring `depends_on` |
//! | `parameters` | object | global parameter name → literal value |
//! | `version` | integer | monotonically increasing, starts at 1 |
//!
//! Unknown top-level keys are ignored on parse; nodes missing any
//! enumerated key are rejected.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single parameter for a workflow node.
///
/// `value` is either a literal or a template string: `{{name}}` resolves
/// against workflow globals, `{{node_id.output_key}}` against the
/// recorded output of an upstream node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameter {
    pub name: String,
    pub value: Value,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// A single step in the workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique node identifier (snake_case).
    pub id: String,
    pub name: String,
    pub description: String,
    /// Service tag, e.g. "slack" | "jira" | "google" | "hr" | "github".
    pub service: String,
    /// Action tag, e.g. "create_channel" | "invite_user".
    pub action: String,
    /// Responsible role label, e.g. "hr_manager" | "it_admin".
    pub actor: String,
    pub parameters: Vec<NodeParameter>,
    pub depends_on: Vec<String>,
    /// Output key → human description of what the output contains.
    pub outputs: BTreeMap<String, String>,
}

/// An explicit edge between two workflow nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub source: String,
    pub target: String,
}

/// A complete workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub team: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl Workflow {
    /// Parse a workflow from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Node lookup map keyed by node id.
    pub fn node_map(&self) -> HashMap<&str, &WorkflowNode> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// The edge set implied by `depends_on`: one `(dep, node.id)` pair per
    /// dependency. Validation requires `edges` to mirror this exactly.
    pub fn implied_edges(&self) -> Vec<WorkflowEdge> {
        let mut edges: Vec<WorkflowEdge> = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.depends_on.iter().map(|dep| WorkflowEdge {
                    source: dep.clone(),
                    target: node.id.clone(),
                })
            })
            .collect();
        edges.sort();
        edges
    }

    /// Distinct service tags referenced by this workflow, in node order.
    pub fn referenced_services(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for node in &self.nodes {
            if !seen.contains(&node.service.as_str()) {
                seen.push(node.service.as_str());
            }
        }
        seen
    }

    /// Actions used per service, for connector building.
    pub fn actions_by_service(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for node in &self.nodes {
            let actions = map.entry(node.service.as_str()).or_default();
            if !actions.contains(&node.action.as_str()) {
                actions.push(node.action.as_str());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_workflow_json() -> Value {
        json!({
            "id": "day1-onboarding",
            "name": "Day 1 Onboarding",
            "description": "Provisions accounts for a new hire",
            "team": "default",
            "nodes": [
                {
                    "id": "create_hr_record",
                    "name": "Create Employee Record",
                    "description": "Create the HR record",
                    "service": "hr",
                    "action": "create_employee",
                    "actor": "hr_manager",
                    "parameters": [
                        {"name": "employee_name", "value": "{{employee_name}}",
                         "description": "Full name", "required": true}
                    ],
                    "depends_on": [],
                    "outputs": {"employee_id": "The created employee ID"}
                },
                {
                    "id": "provision_google",
                    "name": "Provision Google Workspace",
                    "description": "Create the Google account",
                    "service": "google",
                    "action": "provision_account",
                    "actor": "it_admin",
                    "parameters": [
                        {"name": "employee_name", "value": "{{employee_name}}",
                         "description": "Full name", "required": true}
                    ],
                    "depends_on": ["create_hr_record"],
                    "outputs": {"email": "The provisioned email address"}
                }
            ],
            "edges": [
                {"source": "create_hr_record", "target": "provision_google"}
            ],
            "parameters": {"employee_name": "Alice Chen", "role": "Engineer"},
            "version": 1
        })
    }

    #[test]
    fn parse_sample_workflow() {
        let wf: Workflow = serde_json::from_value(sample_workflow_json()).unwrap();
        assert_eq!(wf.id, "day1-onboarding");
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.edges.len(), 1);
        assert_eq!(wf.version, 1);
        assert_eq!(wf.parameters["employee_name"], "Alice Chen");
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let mut value = sample_workflow_json();
        value["unexpected_extra"] = json!("ignored");
        let wf: Workflow = serde_json::from_value(value).unwrap();
        assert_eq!(wf.id, "day1-onboarding");
    }

    #[test]
    fn node_missing_enumerated_key_is_rejected() {
        let mut value = sample_workflow_json();
        value["nodes"][0].as_object_mut().unwrap().remove("actor");
        assert!(serde_json::from_value::<Workflow>(value).is_err());
    }

    #[test]
    fn version_defaults_to_one() {
        let mut value = sample_workflow_json();
        value.as_object_mut().unwrap().remove("version");
        let wf: Workflow = serde_json::from_value(value).unwrap();
        assert_eq!(wf.version, 1);
    }

    #[test]
    fn parameter_required_defaults_to_true() {
        let param: NodeParameter = serde_json::from_value(json!({
            "name": "role", "value": "Engineer", "description": "Job title"
        }))
        .unwrap();
        assert!(param.required);
    }

    #[test]
    fn implied_edges_mirror_depends_on() {
        let wf: Workflow = serde_json::from_value(sample_workflow_json()).unwrap();
        let implied = wf.implied_edges();
        assert_eq!(implied.len(), 1);
        assert_eq!(implied[0].source, "create_hr_record");
        assert_eq!(implied[0].target, "provision_google");
    }

    #[test]
    fn json_round_trip_yields_equal_workflow() {
        let wf: Workflow = serde_json::from_value(sample_workflow_json()).unwrap();
        let reparsed = Workflow::from_json(&wf.to_json_pretty()).unwrap();
        assert_eq!(wf, reparsed);
    }

    #[test]
    fn referenced_services_in_node_order() {
        let wf: Workflow = serde_json::from_value(sample_workflow_json()).unwrap();
        assert_eq!(wf.referenced_services(), vec!["hr", "google"]);
    }

    #[test]
    fn actions_by_service_deduplicates() {
        let wf: Workflow = serde_json::from_value(sample_workflow_json()).unwrap();
        let actions = wf.actions_by_service();
        assert_eq!(actions["hr"], vec!["create_employee"]);
        assert_eq!(actions["google"], vec!["provision_account"]);
    }
}
