//! Probabilistic failure injection for simulated services.
//!
//! A [`FailureConfig`] maps `"service.action"` keys to [`FailureRule`]s.
//! The executor consults it once per node, before dispatch: a uniform
//! variate is drawn and compared to the rule's probability.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Defines how a specific service action should fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRule {
    pub error_kind: ErrorKind,
    pub message: String,
    /// 1.0 = always fail, 0.5 = 50% chance.
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

impl FailureRule {
    pub fn always(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_kind,
            message: message.into(),
            probability: 1.0,
        }
    }

    /// Error string recorded in the trace: `[kind] message`.
    pub fn trace_error(&self) -> String {
        format!("[{}] {}", self.error_kind.as_str(), self.message)
    }
}

/// Maps `service.action` keys to failure rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureConfig {
    pub rules: BTreeMap<String, FailureRule>,
}

impl FailureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, service: &str, action: &str, rule: FailureRule) -> Self {
        self.rules.insert(format!("{service}.{action}"), rule);
        self
    }

    /// Check whether this service action should fail. Returns the rule if
    /// it triggers.
    pub fn should_fail(&self, service: &str, action: &str) -> Option<&FailureRule> {
        let rule = self.rules.get(&format!("{service}.{action}"))?;
        if rand::thread_rng().gen::<f64>() <= rule.probability {
            Some(rule)
        } else {
            None
        }
    }
}
