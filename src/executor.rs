//! DAG executor: runs a workflow in topological order against a service
//! map, with dependency-driven skip propagation and deterministic failure
//! injection.
//!
//! ## Algorithm
//!
//! 1. Compute a topological order with Kahn's algorithm over `depends_on`.
//!    A short result means a cycle: fatal error, no trace steps recorded.
//! 2. Per node, in order:
//!    - any failed-or-skipped predecessor → append a skipped step;
//!    - otherwise consult the failure config → injected failed step;
//!    - otherwise resolve parameters and dispatch. Successful results are
//!      recorded as the node's output for downstream templating;
//!      `precondition_failed` errors also land in the dependency-violation
//!      list.
//! 3. Stamp completion and assemble the [`ExecutionReport`].
//!
//! Nodes run strictly one at a time; trace append order is dispatch order,
//! which keeps runs deterministic enough for the repair loop to reason
//! about.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, instrument};

use crate::error::{ErrorKind, ExecutorError};
use crate::report::ExecutionReport;
use crate::service::{Params, ServiceMap};
use crate::simulator::FailureConfig;
use crate::template;
use crate::trace::ExecutionTrace;
use crate::workflow::{Workflow, WorkflowNode};

/// Executes a workflow DAG in topological order.
pub struct WorkflowExecutor {
    services: ServiceMap,
    trace: ExecutionTrace,
    failure_config: Option<FailureConfig>,
    /// Outputs keyed by node id, for `{{node_id.key}}` templating.
    node_outputs: HashMap<String, Params>,
}

impl WorkflowExecutor {
    pub fn new(
        services: ServiceMap,
        trace: ExecutionTrace,
        failure_config: Option<FailureConfig>,
    ) -> Self {
        Self {
            services,
            trace,
            failure_config,
            node_outputs: HashMap::new(),
        }
    }

    /// Execute the DAG, respecting dependencies.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn execute(&mut self, workflow: &Workflow) -> Result<ExecutionReport, ExecutorError> {
        let order = topological_sort(workflow)?;
        self.trace.mark_started();

        let node_map = workflow.node_map();
        let mut failed_nodes: HashSet<&str> = HashSet::new();
        let mut skipped_nodes: HashSet<&str> = HashSet::new();
        let mut dependency_violations: Vec<String> = Vec::new();
        let mut successful = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for node_id in &order {
            let node = node_map[node_id.as_str()];

            // Skip if any upstream dependency failed or was skipped.
            // Transitive by construction: a skip marks this node skipped too.
            let upstream_failures: Vec<&str> = node
                .depends_on
                .iter()
                .map(String::as_str)
                .filter(|dep| failed_nodes.contains(dep) || skipped_nodes.contains(dep))
                .collect();
            if !upstream_failures.is_empty() {
                skipped_nodes.insert(&node.id);
                skipped += 1;
                self.trace.record_skip(
                    &node.id,
                    &node.service,
                    &node.action,
                    format!(
                        "Skipped due to upstream failure: {}",
                        upstream_failures.join(", ")
                    ),
                );
                continue;
            }

            // Injected failures, consulted once per node prior to dispatch.
            if let Some(config) = &self.failure_config {
                if let Some(rule) = config.should_fail(&node.service, &node.action) {
                    failed_nodes.insert(&node.id);
                    failed += 1;
                    let params = self.resolve_parameters(node, workflow);
                    self.trace.record_failure(
                        &node.id,
                        &node.service,
                        &node.action,
                        params,
                        rule.trace_error(),
                    );
                    continue;
                }
            }

            let params = self.resolve_parameters(node, workflow);
            debug!(node_id = %node.id, service = %node.service, action = %node.action, "dispatching node");

            match self.dispatch(node, &params).await {
                Ok(result) => {
                    self.node_outputs.insert(node.id.clone(), result);
                    successful += 1;
                }
                Err(err) => {
                    failed_nodes.insert(&node.id);
                    failed += 1;
                    if err.kind == ErrorKind::PreconditionFailed {
                        dependency_violations.push(format!("{}: {}", node.id, err.message));
                    }
                    self.trace.record_failure(
                        &node.id,
                        &node.service,
                        &node.action,
                        params,
                        err.message,
                    );
                }
            }
        }

        self.trace.mark_completed();

        Ok(ExecutionReport {
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            total_steps: workflow.nodes.len(),
            successful,
            failed,
            skipped,
            trace: self.trace.snapshot(),
            dependency_violations,
        })
    }

    /// Dispatch one node to its service.
    async fn dispatch(
        &self,
        node: &WorkflowNode,
        params: &Params,
    ) -> Result<Params, crate::error::ServiceError> {
        let service = self
            .services
            .get(&node.service)
            .ok_or_else(|| crate::error::ServiceError::unknown_service(&node.service))?;
        service.call(&node.action, &node.id, params).await
    }

    /// Build the parameter bag for a node, substituting global and
    /// upstream values. Globals first, then upstream outputs; unmatched
    /// templates stay unchanged; non-strings pass through.
    fn resolve_parameters(&self, node: &WorkflowNode, workflow: &Workflow) -> Params {
        node.parameters
            .iter()
            .map(|param| {
                (
                    param.name.clone(),
                    template::resolve_value(&param.value, &workflow.parameters, &self.node_outputs),
                )
            })
            .collect()
    }

    /// Recorded output of a node, if it succeeded.
    pub fn node_output(&self, node_id: &str) -> Option<&Params> {
        self.node_outputs.get(node_id)
    }
}

/// Return node IDs in topological order based on `depends_on` edges
/// (Kahn's algorithm). A cycle is detected when the order is shorter than
/// the node count.
pub fn topological_sort(workflow: &Workflow) -> Result<Vec<String>, ExecutorError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for node in &workflow.nodes {
        in_degree.entry(&node.id).or_insert(0);
        for dep in &node.depends_on {
            dependents.entry(dep.as_str()).or_default().push(&node.id);
            *in_degree.entry(&node.id).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = workflow
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(workflow.nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        if let Some(next) = dependents.get(id) {
            for dependent in next {
                let degree = in_degree.get_mut(dependent).unwrap_or_else(|| {
                    unreachable!("dependent nodes are seeded into in_degree above")
                });
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if order.len() != workflow.nodes.len() {
        let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut nodes: Vec<String> = workflow
            .nodes
            .iter()
            .map(|n| n.id.clone())
            .filter(|id| !ordered.contains(id.as_str()))
            .collect();
        nodes.sort();
        return Err(ExecutorError::CycleDetected { nodes });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{NodeParameter, WorkflowEdge};
    use serde_json::json;

    fn node(id: &str, service: &str, action: &str, deps: &[&str]) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            service: service.to_string(),
            action: action.to_string(),
            actor: "it_admin".to_string(),
            parameters: Vec::new(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            outputs: Default::default(),
        }
    }

    fn workflow(nodes: Vec<WorkflowNode>) -> Workflow {
        let mut wf = Workflow {
            id: "test-flow".to_string(),
            name: "Test Flow".to_string(),
            description: String::new(),
            team: "default".to_string(),
            nodes,
            edges: Vec::new(),
            parameters: Default::default(),
            version: 1,
        };
        wf.edges = wf.implied_edges();
        wf
    }

    #[test]
    fn topological_sort_respects_dependencies() {
        let wf = workflow(vec![
            node("c", "hr", "create_employee", &["b"]),
            node("a", "hr", "create_employee", &[]),
            node("b", "hr", "create_employee", &["a"]),
        ]);
        let order = topological_sort(&wf).unwrap();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn topological_sort_detects_cycles() {
        let wf = workflow(vec![
            node("a", "hr", "create_employee", &["b"]),
            node("b", "hr", "create_employee", &["a"]),
        ]);
        let err = topological_sort(&wf).unwrap_err();
        let ExecutorError::CycleDetected { nodes } = err;
        assert_eq!(nodes, vec!["a", "b"]);
    }

    #[test]
    fn diamond_orders_join_after_both_branches() {
        let wf = workflow(vec![
            node("root", "hr", "create_employee", &[]),
            node("left", "google", "send_email", &["root"]),
            node("right", "slack", "send_message", &["root"]),
            node("join", "jira", "create_issue", &["left", "right"]),
        ]);
        let order = topological_sort(&wf).unwrap();
        assert_eq!(order[0], "root");
        assert_eq!(order[3], "join");
    }

    #[test]
    fn resolve_parameters_chains_globals_then_outputs() {
        let mut wf = workflow(vec![node("invite", "slack", "invite_user", &[])]);
        wf.parameters
            .insert("employee_name".to_string(), json!("Alice Chen"));
        wf.nodes[0].parameters = vec![
            NodeParameter {
                name: "email".to_string(),
                value: json!("{{provision_google.email}}"),
                description: String::new(),
                required: true,
            },
            NodeParameter {
                name: "greeting".to_string(),
                value: json!("Hi {{employee_name}}"),
                description: String::new(),
                required: false,
            },
        ];

        let mut executor = WorkflowExecutor::new(ServiceMap::new(), ExecutionTrace::new(), None);
        let mut output = Params::new();
        output.insert("email".to_string(), json!("alice.chen@company.com"));
        executor
            .node_outputs
            .insert("provision_google".to_string(), output);

        let params = executor.resolve_parameters(&wf.nodes[0], &wf);
        assert_eq!(params["email"], "alice.chen@company.com");
        assert_eq!(params["greeting"], "Hi Alice Chen");
    }

    #[test]
    fn edges_mirror_depends_on_in_test_fixture() {
        let wf = workflow(vec![
            node("a", "hr", "create_employee", &[]),
            node("b", "google", "provision_account", &["a"]),
        ]);
        assert_eq!(
            wf.edges,
            vec![WorkflowEdge {
                source: "a".to_string(),
                target: "b".to_string()
            }]
        );
    }
}
