//! # FlowForge
//!
//! Workflow automation from natural language: a language-model planner
//! drafts declarative workflow DAGs, a deterministic executor runs them
//! against real service connectors or an in-memory simulator, and a
//! bounded self-correction loop feeds execution failures back to the
//! planner.
//!
//! ## Architecture
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`workflow`] | Workflow / node / edge schema types |
//! | [`validator`] | Layered validation (schema, nodes, edges, graph) |
//! | [`template`] | `{{name}}` / `{{node.key}}` parameter resolution |
//! | [`trace`] | Append-only execution trace |
//! | [`executor`] | Topological DAG execution with skip propagation |
//! | [`simulator`] | In-memory services with cross-service preconditions |
//! | [`connector`] | Real HTTP connectors, registry, manifest-driven customs |
//! | [`sandbox`] | Sandboxed `run_command` with capped readers |
//! | [`agent`] | Provider-driven tool loop and tool surface |
//! | [`pipeline`] | Planner → executor → repair loop |
//! | [`store`] | Versioned file-backed workflow storage |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use flowforge::{create_service_layer, Settings, Workflow, WorkflowExecutor};
//!
//! let workflow = Workflow::from_json(&std::fs::read_to_string("workflow.json")?)?;
//! let layer = create_service_layer(&Settings::simulator());
//! let mut executor = WorkflowExecutor::new(layer.services, layer.trace.clone(), None);
//! let report = executor.execute(&workflow).await?;
//! println!("{}", report.to_markdown());
//! # Ok::<(), flowforge::FlowError>(())
//! ```
//!
//! ## Execution model
//!
//! Nodes run strictly sequentially in one topological order; action
//! ordering determines precondition outcomes in the simulator, and the
//! trace must be deterministic for the repair loop to reason about. Each
//! run owns its simulator state, trace, and connector instances; nothing
//! is shared across runs except the read-only built-in connector table.

pub mod agent;
pub mod catalog;
pub mod config;
pub mod connector;
pub mod error;
pub mod event;
pub mod executor;
pub mod kb;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod sandbox;
pub mod service;
pub mod simulator;
pub mod store;
pub mod template;
pub mod trace;
pub mod validator;
pub mod workflow;

pub use config::{ConnectorMode, Settings};
pub use connector::{create_service_layer, ServiceLayer};
pub use error::{ErrorKind, ExecutorError, FlowError, PlannerError, ServiceError};
pub use event::PlannerEvent;
pub use executor::WorkflowExecutor;
pub use pipeline::{GenerateRequest, Planner, MAX_FIX_ATTEMPTS};
pub use report::ExecutionReport;
pub use simulator::{create_simulator, FailureConfig, FailureRule, SimulatorState};
pub use store::WorkflowStore;
pub use trace::{ExecutionTrace, StepStatus, TraceStep};
pub use validator::{ValidationError, ValidationResult, Validator};
pub use workflow::{NodeParameter, Workflow, WorkflowEdge, WorkflowNode};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_to_end_simulator_run_from_json() {
        let json = r#"{
            "id": "mini-onboarding",
            "name": "Mini Onboarding",
            "description": "HR record plus Google account",
            "team": "default",
            "nodes": [
                {
                    "id": "create_hr_record", "name": "HR", "description": "",
                    "service": "hr", "action": "create_employee", "actor": "hr_manager",
                    "parameters": [
                        {"name": "employee_name", "value": "{{employee_name}}",
                         "description": "", "required": true}
                    ],
                    "depends_on": [], "outputs": {"employee_id": "id"}
                },
                {
                    "id": "provision_google", "name": "Google", "description": "",
                    "service": "google", "action": "provision_account", "actor": "it_admin",
                    "parameters": [
                        {"name": "employee_name", "value": "{{employee_name}}",
                         "description": "", "required": true}
                    ],
                    "depends_on": ["create_hr_record"], "outputs": {"email": "email"}
                }
            ],
            "edges": [{"source": "create_hr_record", "target": "provision_google"}],
            "parameters": {"employee_name": "Alice Chen"},
            "version": 1
        }"#;

        let workflow = Workflow::from_json(json).unwrap();
        assert!(Validator::new().validate(&workflow).is_valid());

        let layer = create_service_layer(&Settings::simulator());
        let mut executor = WorkflowExecutor::new(layer.services, layer.trace.clone(), None);
        let report = executor.execute(&workflow).await.unwrap();

        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 0);
        assert!(report.to_markdown().contains("Mini Onboarding"));
    }
}
