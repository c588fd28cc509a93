//! Real service connectors and the service-layer builder.
//!
//! Connectors implement the same [`Service`](crate::service::Service)
//! contract as the simulator, for the same `(service, action)` pairs.
//! Each constructs from [`Settings`]; missing credentials mean "not
//! configured" and the connector is excluded from the service map for
//! that run (hybrid mode falls back to the simulator service).
//!
//! All connectors share one [`reqwest::Client`] for the lifetime of a
//! run; dropping the service map drops the last handle, closing the
//! transport exactly once at teardown.

pub mod builder;
pub mod custom;
mod github;
mod google;
mod hr;
mod jira;
pub mod registry;
mod slack;

pub use github::GithubConnector;
pub use google::GoogleConnector;
pub use hr::HrConnector;
pub use jira::JiraConnector;
pub use slack::SlackConnector;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConnectorMode, Settings};
use crate::error::{ErrorKind, ServiceError};
use crate::service::{Params, ServiceMap};
use crate::simulator::{create_simulator, SharedState};
use crate::trace::ExecutionTrace;

use registry::ConnectorRegistry;

/// Everything one execution needs from the service layer.
pub struct ServiceLayer {
    pub state: SharedState,
    pub trace: ExecutionTrace,
    pub services: ServiceMap,
}

/// Directory holding generated connector manifests, from settings or the
/// conventional default.
pub fn custom_connector_dir(settings: &Settings) -> PathBuf {
    settings
        .custom_connector_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("custom_connectors"))
}

/// Compose the service map for one run.
///
/// - `simulator` mode: the in-memory simulator services only.
/// - `hybrid` / `real`: for each service name present in either the
///   simulator set or the registry (built-in + custom manifests), prefer
///   a configured real connector; fall back to the simulator service. A
///   name that resolves only through a manifest is still exposed.
pub fn create_service_layer(settings: &Settings) -> ServiceLayer {
    let (state, trace, sim_services) = create_simulator();

    if settings.connector_mode == ConnectorMode::Simulator {
        return ServiceLayer {
            state,
            trace,
            services: sim_services,
        };
    }

    let client = shared_client();
    let registry = ConnectorRegistry::new(
        settings.clone(),
        trace.clone(),
        client,
        custom_connector_dir(settings),
    );

    let mut names: Vec<String> = sim_services.keys().cloned().collect();
    for name in registry.list_available() {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.sort();

    let mut services = ServiceMap::new();
    for name in names {
        let resolved = registry.resolve(&name);
        let simulated = sim_services.get(&name);

        match resolved {
            // Prefer a configured connector; always expose connector-only
            // services (no simulator counterpart exists for them).
            Some(connector) if connector.configured || simulated.is_none() => {
                services.insert(name, connector.service);
            }
            _ => {
                if let Some(sim) = simulated {
                    services.insert(name.clone(), std::sync::Arc::clone(sim));
                }
            }
        }
    }

    ServiceLayer {
        state,
        trace,
        services,
    }
}

/// The shared HTTP transport for one run.
fn shared_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent("flowforge/0.1")
        .build()
        .unwrap_or_default()
}

/// Map a non-success HTTP status into the common taxonomy.
pub(crate) fn status_error(service: &str, action: &str, status: u16, body: &str) -> ServiceError {
    let kind = ErrorKind::from_status(status);
    let message = match kind {
        ErrorKind::AuthError => format!("{service} authentication failed — check credentials"),
        ErrorKind::PermissionDenied => format!("{service} permission denied"),
        ErrorKind::NotFound => format!("{service} resource not found"),
        ErrorKind::AlreadyExists => format!("{service} resource already exists"),
        ErrorKind::RateLimit => format!("{service} rate limit hit"),
        _ => {
            let snippet: String = body.chars().take(300).collect();
            format!("{service} {action} failed ({status}): {snippet}")
        }
    };
    ServiceError::new(kind, message)
}

/// Append a success trace step with the simulator's shape.
pub(crate) fn log_success(
    trace: &ExecutionTrace,
    service: &str,
    node_id: &str,
    action: &str,
    params: &Params,
    result: &Params,
) {
    trace.record_success(node_id, service, action, params.clone(), result.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulator_mode_exposes_only_simulator_services() {
        let settings = Settings::simulator();
        let layer = create_service_layer(&settings);
        assert_eq!(layer.services.len(), 5);
        assert!(layer.services.contains_key("hr"));
        assert!(layer.services.contains_key("github"));
    }

    #[test]
    fn hybrid_without_credentials_falls_back_to_simulator() {
        let mut settings = Settings::simulator();
        settings.connector_mode = ConnectorMode::Hybrid;
        settings.custom_connector_dir = Some(std::env::temp_dir().join("flowforge-none"));

        let layer = create_service_layer(&settings);
        // No credentials anywhere: every service resolves to its simulator.
        assert_eq!(layer.services.len(), 5);
    }

    #[test]
    fn hybrid_with_slack_token_prefers_the_connector() {
        let mut settings = Settings::simulator();
        settings.connector_mode = ConnectorMode::Hybrid;
        settings.slack_bot_token = Some("xoxb-test".to_string());
        settings.custom_connector_dir = Some(std::env::temp_dir().join("flowforge-none"));

        let layer = create_service_layer(&settings);
        assert_eq!(layer.services.len(), 5);
        // The slack entry is the real connector; its action set matches.
        let slack = &layer.services["slack"];
        assert_eq!(slack.name(), "slack");
        assert!(slack.actions().contains(&"invite_user"));
    }

    #[test]
    fn status_error_maps_the_taxonomy() {
        assert_eq!(
            status_error("slack", "invite_user", 401, "").kind,
            ErrorKind::AuthError
        );
        assert_eq!(
            status_error("jira", "create_issue", 429, "").kind,
            ErrorKind::RateLimit
        );
        let err = status_error("hr", "create_employee", 500, "internal");
        assert_eq!(err.kind, ErrorKind::ConnectorError);
        assert!(err.message.contains("create_employee"));
    }

    #[test]
    fn custom_connector_dir_has_conventional_default() {
        let settings = Settings::simulator();
        assert_eq!(
            custom_connector_dir(&settings),
            PathBuf::from("custom_connectors")
        );
    }
}
