//! Service abstraction: the uniform dispatch contract every backend
//! implements, whether simulator or real connector.
//!
//! An action receives the calling node's id plus a parameter bag and
//! either returns a result map (always containing a past-tense `status`
//! key) or fails with a typed [`ServiceError`]. Dispatch is explicit:
//! each implementation matches on the action name inside [`Service::call`]
//! and returns `unknown_action` for misses.
//!
//! Simulator services do synchronous work and resolve immediately; real
//! connectors await HTTP calls. The executor drives both through the same
//! async trait, so the two are indistinguishable at the call site.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

/// Parameter/result bag for service actions (JSON object).
pub type Params = serde_json::Map<String, Value>;

/// Services available to one execution, keyed by service tag.
pub type ServiceMap = HashMap<String, Arc<dyn Service>>;

/// A named provider of actions.
#[async_trait]
pub trait Service: Send + Sync {
    /// Service tag, e.g. "hr", "slack".
    fn name(&self) -> &str;

    /// Action names this service dispatches.
    fn actions(&self) -> Vec<&str>;

    /// Invoke one action on behalf of a workflow node.
    ///
    /// Implementations append a success trace step before returning a
    /// result, and must return a result containing a `status` key.
    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError>;
}

/// Read a string parameter with a default (most action parameters are
/// optional with conventional defaults).
pub fn param_str<'a>(params: &'a Params, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Read an optional string parameter, treating empty strings as absent.
pub fn param_opt<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Read a string-array parameter, tolerating scalars and absence.
pub fn param_list(params: &Params, key: &str) -> Vec<String> {
    match params.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Build a result map from key/value pairs.
#[macro_export]
macro_rules! result_map {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::service::Params::new();
        $(map.insert($key.to_string(), ::serde_json::json!($value));)*
        map
    }};
}
