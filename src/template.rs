//! Single-pass template resolver for node parameters.
//!
//! Template grammar: `{{name}}` resolves against workflow global
//! parameters; `{{node_id.output_key}}` resolves against the recorded
//! output of the identified upstream node. Resolution is pure textual
//! substitution over the string form of the value; non-string values pass
//! through unchanged, and unmatched templates are left intact.
//!
//! Globals are consulted before upstream outputs, so a global whose name
//! happens to contain a dot still wins over a node reference.

use std::collections::HashMap;
use std::ops::Range;

use serde_json::Value;

use crate::service::Params;

/// Token representing a parsed template fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (range in the original string).
    Literal(Range<usize>),
    /// A `{{...}}` placeholder; content excludes the braces.
    Placeholder(Range<usize>),
}

/// Tokenize a template string into tokens (single pass).
///
/// Each template is resolved at most twice per run (failure-injection
/// paths re-resolve for the trace), so no caching is needed.
pub fn tokenize(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            // Find the closing }}
            if let Some(rel) = template[i + 2..].find("}}") {
                let content = (i + 2)..(i + 2 + rel);
                if !content.is_empty() {
                    if i > literal_start {
                        tokens.push(Token::Literal(literal_start..i));
                    }
                    tokens.push(Token::Placeholder(content.clone()));
                    i = content.end + 2;
                    literal_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }

    if literal_start < template.len() {
        tokens.push(Token::Literal(literal_start..template.len()));
    }

    tokens
}

/// Render a JSON value the way parameters embed it into strings:
/// strings bare, everything else in JSON form.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve one template string against globals and upstream outputs.
pub fn resolve_str(
    template: &str,
    globals: &Params,
    outputs: &HashMap<String, Params>,
) -> String {
    let tokens = tokenize(template);
    let mut result = String::with_capacity(template.len());

    for token in &tokens {
        match token {
            Token::Literal(range) => result.push_str(&template[range.clone()]),
            Token::Placeholder(range) => {
                let content = &template[range.clone()];

                // Globals win, even over dotted names.
                if let Some(value) = globals.get(content) {
                    result.push_str(&value_to_string(value));
                    continue;
                }

                // {{node_id.output_key}} against upstream outputs.
                if let Some((node_id, key)) = content.split_once('.') {
                    if let Some(value) = outputs.get(node_id).and_then(|out| out.get(key)) {
                        result.push_str(&value_to_string(value));
                        continue;
                    }
                }

                // Unmatched: keep the original template text.
                result.push_str("{{");
                result.push_str(content);
                result.push_str("}}");
            }
        }
    }

    result
}

/// Resolve a parameter value: strings containing `{{` are substituted,
/// everything else passes through untouched.
pub fn resolve_value(
    value: &Value,
    globals: &Params,
    outputs: &HashMap<String, Params>,
) -> Value {
    match value {
        Value::String(s) if s.contains("{{") => {
            Value::String(resolve_str(s, globals, outputs))
        }
        other => other.clone(),
    }
}
