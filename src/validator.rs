//! Layered workflow validation.
//!
//! Four layers, each with structured errors:
//!
//! | Layer | Checks |
//! |-------|--------|
//! | Schema | version ≥ 1, kebab-case workflow id, non-empty name |
//! | Nodes | unique snake_case node ids, non-empty service/action tags |
//! | Edges | `depends_on` targets exist, edge endpoints exist, edge set mirrors `depends_on` |
//! | Graph | cycle detection (error), orphan nodes (warning) |
//!
//! Warnings never fail validation; errors do.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::executor::topological_sort;
use crate::workflow::Workflow;

static KEBAB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static regex"));
static SNAKE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(_[a-z0-9]+)*$").expect("static regex"));

/// Validation layer (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLayer {
    Schema = 1,
    Nodes = 2,
    Edges = 3,
    Graph = 4,
}

impl std::fmt::Display for ValidationLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationLayer::Schema => write!(f, "Schema"),
            ValidationLayer::Nodes => write!(f, "Nodes"),
            ValidationLayer::Edges => write!(f, "Edges"),
            ValidationLayer::Graph => write!(f, "Graph"),
        }
    }
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation error with context.
#[derive(Debug, Error)]
pub enum ValidationError {
    // Layer 1: Schema
    #[error("Workflow version must be >= 1, got {version}")]
    InvalidVersion { version: u32 },

    #[error("Invalid workflow id '{id}': must be kebab-case")]
    InvalidWorkflowId { id: String },

    #[error("Workflow name must not be empty")]
    EmptyName,

    // Layer 2: Nodes
    #[error("Duplicate node id: '{id}'")]
    DuplicateNodeId { id: String },

    #[error("Invalid node id '{id}': must be snake_case")]
    InvalidNodeIdFormat { id: String },

    #[error("Node '{id}' is missing a {field} tag")]
    EmptyNodeTag { id: String, field: &'static str },

    // Layer 3: Edges
    #[error("Node '{node}' depends on unknown node '{dep}'")]
    UnknownDependency { node: String, dep: String },

    #[error("Edge source '{from_node}' does not exist")]
    EdgeSourceNotFound { from_node: String },

    #[error("Edge target '{target}' does not exist")]
    EdgeTargetNotFound { target: String },

    #[error("Edge {from_node} -> {target} does not mirror any depends_on entry")]
    EdgeWithoutDependency { from_node: String, target: String },

    #[error("Dependency {from_node} -> {target} has no mirroring edge")]
    DependencyWithoutEdge { from_node: String, target: String },

    // Layer 4: Graph
    #[error("Cycle detected involving nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("Orphan node '{id}' has no connections")]
    OrphanNode { id: String },
}

impl ValidationError {
    pub fn layer(&self) -> ValidationLayer {
        match self {
            ValidationError::InvalidVersion { .. }
            | ValidationError::InvalidWorkflowId { .. }
            | ValidationError::EmptyName => ValidationLayer::Schema,
            ValidationError::DuplicateNodeId { .. }
            | ValidationError::InvalidNodeIdFormat { .. }
            | ValidationError::EmptyNodeTag { .. } => ValidationLayer::Nodes,
            ValidationError::UnknownDependency { .. }
            | ValidationError::EdgeSourceNotFound { .. }
            | ValidationError::EdgeTargetNotFound { .. }
            | ValidationError::EdgeWithoutDependency { .. }
            | ValidationError::DependencyWithoutEdge { .. } => ValidationLayer::Edges,
            ValidationError::CycleDetected { .. } | ValidationError::OrphanNode { .. } => {
                ValidationLayer::Graph
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ValidationError::OrphanNode { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Get a suggestion for fixing this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        Some(match self {
            ValidationError::InvalidVersion { .. } => "Set version to 1 for a new workflow",
            ValidationError::InvalidWorkflowId { .. } => {
                "Use lowercase letters, digits, and dashes: 'day1-onboarding'"
            }
            ValidationError::EmptyName => "Give the workflow a short human-readable name",
            ValidationError::DuplicateNodeId { .. } => "Rename one of the duplicate nodes",
            ValidationError::InvalidNodeIdFormat { .. } => {
                "Use lowercase letters, digits, and underscores: 'create_hr_record'"
            }
            ValidationError::EmptyNodeTag { .. } => {
                "Every node needs non-empty service and action tags"
            }
            ValidationError::UnknownDependency { .. } => {
                "depends_on entries must name other nodes in this workflow"
            }
            ValidationError::EdgeSourceNotFound { .. }
            | ValidationError::EdgeTargetNotFound { .. } => {
                "Edge endpoints must be existing node ids"
            }
            ValidationError::EdgeWithoutDependency { .. } => {
                "Add the matching depends_on entry on the target node, or remove the edge"
            }
            ValidationError::DependencyWithoutEdge { .. } => {
                "Add the matching edge to the edges list"
            }
            ValidationError::CycleDetected { .. } => {
                "Remove one dependency from the cycle; workflows must be acyclic"
            }
            ValidationError::OrphanNode { .. } => {
                "Connect the node with depends_on, or remove it"
            }
        })
    }
}

/// Result of validating one workflow.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn add(&mut self, error: ValidationError) {
        if error.severity() == Severity::Warning {
            self.warnings.push(error);
        } else {
            self.errors.push(error);
        }
    }

    /// Multi-line rendering of all errors, for FlowError::Validation.
    pub fn render_errors(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.layer(), e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Workflow validator. Stateless; construct once and reuse.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, workflow: &Workflow) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_schema(workflow, &mut result);
        self.validate_nodes(workflow, &mut result);
        self.validate_edges(workflow, &mut result);
        self.validate_graph(workflow, &mut result);

        result
    }

    fn validate_schema(&self, workflow: &Workflow, result: &mut ValidationResult) {
        if workflow.version < 1 {
            result.add(ValidationError::InvalidVersion {
                version: workflow.version,
            });
        }
        if !KEBAB_ID.is_match(&workflow.id) {
            result.add(ValidationError::InvalidWorkflowId {
                id: workflow.id.clone(),
            });
        }
        if workflow.name.trim().is_empty() {
            result.add(ValidationError::EmptyName);
        }
    }

    fn validate_nodes(&self, workflow: &Workflow, result: &mut ValidationResult) {
        let mut seen = std::collections::HashSet::new();
        for node in &workflow.nodes {
            if !seen.insert(node.id.as_str()) {
                result.add(ValidationError::DuplicateNodeId {
                    id: node.id.clone(),
                });
            }
            if !SNAKE_ID.is_match(&node.id) {
                result.add(ValidationError::InvalidNodeIdFormat {
                    id: node.id.clone(),
                });
            }
            if node.service.trim().is_empty() {
                result.add(ValidationError::EmptyNodeTag {
                    id: node.id.clone(),
                    field: "service",
                });
            }
            if node.action.trim().is_empty() {
                result.add(ValidationError::EmptyNodeTag {
                    id: node.id.clone(),
                    field: "action",
                });
            }
        }
    }

    fn validate_edges(&self, workflow: &Workflow, result: &mut ValidationResult) {
        let ids: std::collections::HashSet<&str> =
            workflow.nodes.iter().map(|n| n.id.as_str()).collect();

        for node in &workflow.nodes {
            for dep in &node.depends_on {
                if !ids.contains(dep.as_str()) {
                    result.add(ValidationError::UnknownDependency {
                        node: node.id.clone(),
                        dep: dep.clone(),
                    });
                }
            }
        }

        let implied: std::collections::BTreeSet<_> = workflow.implied_edges().into_iter().collect();
        let declared: std::collections::BTreeSet<_> = workflow.edges.iter().cloned().collect();

        for edge in &workflow.edges {
            if !ids.contains(edge.source.as_str()) {
                result.add(ValidationError::EdgeSourceNotFound {
                    from_node: edge.source.clone(),
                });
            }
            if !ids.contains(edge.target.as_str()) {
                result.add(ValidationError::EdgeTargetNotFound {
                    target: edge.target.clone(),
                });
            }
        }

        // The edge set must equal the set of (dep, node.id) pairs.
        for edge in declared.difference(&implied) {
            result.add(ValidationError::EdgeWithoutDependency {
                from_node: edge.source.clone(),
                target: edge.target.clone(),
            });
        }
        for edge in implied.difference(&declared) {
            result.add(ValidationError::DependencyWithoutEdge {
                from_node: edge.source.clone(),
                target: edge.target.clone(),
            });
        }
    }

    fn validate_graph(&self, workflow: &Workflow, result: &mut ValidationResult) {
        // Cycle detection only makes sense once dependencies reference
        // real nodes.
        let deps_resolve = result
            .errors
            .iter()
            .all(|e| !matches!(e, ValidationError::UnknownDependency { .. }));
        if deps_resolve {
            if let Err(crate::error::ExecutorError::CycleDetected { nodes }) =
                topological_sort(workflow)
            {
                result.add(ValidationError::CycleDetected { nodes });
            }
        }

        if workflow.nodes.len() > 1 {
            let connected: std::collections::HashSet<&str> = workflow
                .nodes
                .iter()
                .flat_map(|n| {
                    n.depends_on
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(n.id.as_str()).filter(|_| !n.depends_on.is_empty()))
                })
                .collect();
            for node in &workflow.nodes {
                if !connected.contains(node.id.as_str()) {
                    result.add(ValidationError::OrphanNode {
                        id: node.id.clone(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{WorkflowEdge, WorkflowNode};

    fn node(id: &str, deps: &[&str]) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            service: "hr".to_string(),
            action: "create_employee".to_string(),
            actor: "hr_manager".to_string(),
            parameters: Vec::new(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            outputs: Default::default(),
        }
    }

    fn valid_workflow() -> Workflow {
        let mut wf = Workflow {
            id: "day1-onboarding".to_string(),
            name: "Day 1 Onboarding".to_string(),
            description: String::new(),
            team: "default".to_string(),
            nodes: vec![node("create_hr_record", &[]), node("enroll", &["create_hr_record"])],
            edges: Vec::new(),
            parameters: Default::default(),
            version: 1,
        };
        wf.edges = wf.implied_edges();
        wf
    }

    #[test]
    fn valid_workflow_passes() {
        let result = Validator::new().validate(&valid_workflow());
        assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn rejects_version_zero() {
        let mut wf = valid_workflow();
        wf.version = 0;
        let result = Validator::new().validate(&wf);
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].layer(), ValidationLayer::Schema);
    }

    #[test]
    fn rejects_non_kebab_workflow_id() {
        let mut wf = valid_workflow();
        wf.id = "Day1 Onboarding".to_string();
        let result = Validator::new().validate(&wf);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidWorkflowId { .. })));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let mut wf = valid_workflow();
        wf.nodes.push(node("create_hr_record", &[]));
        let result = Validator::new().validate(&wf);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateNodeId { .. })));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let mut wf = valid_workflow();
        wf.nodes[1].depends_on = vec!["missing_node".to_string()];
        wf.edges = wf.implied_edges();
        let result = Validator::new().validate(&wf);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownDependency { .. })));
    }

    #[test]
    fn edge_set_must_mirror_depends_on_both_ways() {
        // Extra declared edge.
        let mut wf = valid_workflow();
        wf.edges.push(WorkflowEdge {
            source: "enroll".to_string(),
            target: "create_hr_record".to_string(),
        });
        let result = Validator::new().validate(&wf);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::EdgeWithoutDependency { .. })));

        // Missing declared edge.
        let mut wf = valid_workflow();
        wf.edges.clear();
        let result = Validator::new().validate(&wf);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DependencyWithoutEdge { .. })));
    }

    #[test]
    fn detects_cycles_at_graph_layer() {
        let mut wf = valid_workflow();
        wf.nodes = vec![node("a", &["b"]), node("b", &["a"])];
        wf.edges = wf.implied_edges();
        let result = Validator::new().validate(&wf);
        let cycle = result
            .errors
            .iter()
            .find(|e| matches!(e, ValidationError::CycleDetected { .. }))
            .expect("cycle error");
        assert_eq!(cycle.layer(), ValidationLayer::Graph);
    }

    #[test]
    fn orphan_node_is_a_warning_not_an_error() {
        let mut wf = valid_workflow();
        wf.nodes.push(node("loner", &[]));
        let result = Validator::new().validate(&wf);
        assert!(result.is_valid());
        assert!(result.has_warnings());
        assert!(matches!(
            result.warnings[0],
            ValidationError::OrphanNode { .. }
        ));
    }

    #[test]
    fn single_node_workflow_has_no_orphan_warning() {
        let mut wf = valid_workflow();
        wf.nodes = vec![node("only", &[])];
        wf.edges.clear();
        let result = Validator::new().validate(&wf);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
    }

    #[test]
    fn every_error_has_a_suggestion() {
        let mut wf = valid_workflow();
        wf.version = 0;
        wf.id = "Bad Id".to_string();
        wf.name = " ".to_string();
        wf.nodes[1].depends_on = vec!["nowhere".to_string()];
        let result = Validator::new().validate(&wf);
        assert!(!result.is_valid());
        for error in &result.errors {
            assert!(error.suggestion().is_some(), "no suggestion for {error:?}");
        }
    }

    #[test]
    fn render_errors_includes_layers() {
        let mut wf = valid_workflow();
        wf.version = 0;
        let result = Validator::new().validate(&wf);
        let rendered = result.render_errors();
        assert!(rendered.contains("[Schema]"));
        assert!(rendered.contains("version"));
    }
}
