//! Connector registry: service name → connector resolution.
//!
//! Built-in connectors are enumerated in one explicit table (no
//! import-time registration side effects); the table is initialized once
//! and never mutated. Instantiated connectors are cached per registry —
//! and a registry lives for one execution, so connector instances and
//! their HTTP transport are never shared across runs.
//!
//! Resolution order for [`ConnectorRegistry::resolve`]:
//! 1. cached instance;
//! 2. built-in registration, constructed from settings;
//! 3. file-backed generated manifest in the custom-connector directory,
//!    loaded only after static validation;
//! 4. `None`.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Settings;
use crate::service::Service;
use crate::trace::ExecutionTrace;

use super::custom::{load_manifest, CustomConnector};
use super::{GithubConnector, GoogleConnector, HrConnector, JiraConnector, SlackConnector};

static SAFE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));

/// Service names must be safe identifiers before they touch the
/// filesystem or a generated manifest.
pub fn is_safe_service_name(name: &str) -> bool {
    SAFE_NAME.is_match(name)
}

/// One built-in connector registration.
pub struct BuiltinConnector {
    pub service_name: &'static str,
    pub is_configured: fn(&Settings) -> bool,
    pub construct: fn(&Settings, ExecutionTrace, reqwest::Client) -> Arc<dyn Service>,
}

fn construct_hr(s: &Settings, t: ExecutionTrace, c: reqwest::Client) -> Arc<dyn Service> {
    Arc::new(HrConnector::from_settings(s, t, c))
}
fn construct_google(s: &Settings, t: ExecutionTrace, c: reqwest::Client) -> Arc<dyn Service> {
    Arc::new(GoogleConnector::from_settings(s, t, c))
}
fn construct_slack(s: &Settings, t: ExecutionTrace, c: reqwest::Client) -> Arc<dyn Service> {
    Arc::new(SlackConnector::from_settings(s, t, c))
}
fn construct_jira(s: &Settings, t: ExecutionTrace, c: reqwest::Client) -> Arc<dyn Service> {
    Arc::new(JiraConnector::from_settings(s, t, c))
}
fn construct_github(s: &Settings, t: ExecutionTrace, c: reqwest::Client) -> Arc<dyn Service> {
    Arc::new(GithubConnector::from_settings(s, t, c))
}

/// The built-in connector table. Populated once; read-only afterwards.
pub fn builtin_connectors() -> &'static [BuiltinConnector] {
    static TABLE: Lazy<Vec<BuiltinConnector>> = Lazy::new(|| {
        vec![
            BuiltinConnector {
                service_name: "hr",
                is_configured: HrConnector::is_configured,
                construct: construct_hr,
            },
            BuiltinConnector {
                service_name: "google",
                is_configured: GoogleConnector::is_configured,
                construct: construct_google,
            },
            BuiltinConnector {
                service_name: "slack",
                is_configured: SlackConnector::is_configured,
                construct: construct_slack,
            },
            BuiltinConnector {
                service_name: "jira",
                is_configured: JiraConnector::is_configured,
                construct: construct_jira,
            },
            BuiltinConnector {
                service_name: "github",
                is_configured: GithubConnector::is_configured,
                construct: construct_github,
            },
        ]
    });
    &TABLE
}

/// A resolved connector plus whether its credentials are present.
#[derive(Clone)]
pub struct ResolvedConnector {
    pub service: Arc<dyn Service>,
    pub configured: bool,
}

/// Discovers and instantiates connectors for one execution.
pub struct ConnectorRegistry {
    settings: Settings,
    trace: ExecutionTrace,
    client: reqwest::Client,
    custom_dir: PathBuf,
    cache: DashMap<String, ResolvedConnector>,
}

impl ConnectorRegistry {
    pub fn new(
        settings: Settings,
        trace: ExecutionTrace,
        client: reqwest::Client,
        custom_dir: PathBuf,
    ) -> Self {
        Self {
            settings,
            trace,
            client,
            custom_dir,
            cache: DashMap::new(),
        }
    }

    /// Return a live connector for this service, or `None` if neither a
    /// built-in nor a valid custom manifest exists.
    pub fn resolve(&self, service_name: &str) -> Option<ResolvedConnector> {
        use dashmap::mapref::entry::Entry;

        match self.cache.entry(service_name.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                let resolved = self.construct(service_name)?;
                entry.insert(resolved.clone());
                Some(resolved)
            }
        }
    }

    fn construct(&self, service_name: &str) -> Option<ResolvedConnector> {
        // 1. Built-in registrations.
        if let Some(builtin) = builtin_connectors()
            .iter()
            .find(|b| b.service_name == service_name)
        {
            return Some(ResolvedConnector {
                service: (builtin.construct)(
                    &self.settings,
                    self.trace.clone(),
                    self.client.clone(),
                ),
                configured: (builtin.is_configured)(&self.settings),
            });
        }

        // 2. Generated manifest in the custom-connector directory.
        if !is_safe_service_name(service_name) {
            return None;
        }
        let path = self.custom_dir.join(format!("{service_name}.json"));
        if !path.exists() {
            return None;
        }
        let manifest = load_manifest(&path, service_name).ok()?;
        let configured = manifest.is_configured();
        Some(ResolvedConnector {
            service: Arc::new(CustomConnector::new(
                manifest,
                self.trace.clone(),
                self.client.clone(),
            )),
            configured,
        })
    }

    /// Remove a cached connector so the next resolve reloads it.
    pub fn invalidate(&self, service_name: &str) {
        self.cache.remove(service_name);
    }

    /// Service names for all registered connectors (built-in + custom).
    pub fn list_available(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_connectors()
            .iter()
            .map(|b| b.service_name.to_string())
            .collect();

        if let Ok(entries) = std::fs::read_dir(&self.custom_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if is_safe_service_name(stem) && !names.iter().any(|n| n == stem) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        names.sort();
        names
    }
}
