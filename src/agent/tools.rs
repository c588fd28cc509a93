//! Tool surface exposed to planner and builder agents.
//!
//! Small, composable primitives: file I/O confined to the workspace, the
//! sandboxed `run_command`, and the two discovery tools (`search_apis`,
//! `search_knowledge_base`). Tool failures are returned as error strings
//! visible to the agent, which decides whether to retry or restructure.

use std::path::{Component, Path, PathBuf};

use serde_json::{json, Value};

use crate::catalog;
use crate::kb;
use crate::provider::ToolSchema;
use crate::sandbox::{self, COMMAND_TIMEOUT_SECS, MAX_OUTPUT_BYTES};

/// The default toolset granted to agent sessions.
pub const DEFAULT_TOOL_NAMES: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "run_command",
    "search_apis",
    "search_knowledge_base",
];

/// Executes tool calls for one agent session against one workspace.
pub struct ToolRegistry {
    workspace: PathBuf,
    team: String,
    kb_dir: Option<PathBuf>,
}

impl ToolRegistry {
    pub fn new(workspace: impl Into<PathBuf>, team: impl Into<String>, kb_dir: Option<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            team: team.into(),
            kb_dir,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Schemas for every tool, in the order of [`DEFAULT_TOOL_NAMES`].
    pub fn schemas(&self) -> Vec<ToolSchema> {
        vec![
            ToolSchema {
                name: "read_file".to_string(),
                description: "Read a text file from the workspace.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string",
                                 "description": "Absolute or workspace-relative file path."}
                    },
                    "required": ["path"]
                }),
            },
            ToolSchema {
                name: "write_file".to_string(),
                description: "Write text content to a file, creating parent directories if needed."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string",
                                 "description": "Absolute or workspace-relative file path."},
                        "content": {"type": "string", "description": "File content."}
                    },
                    "required": ["path", "content"]
                }),
            },
            ToolSchema {
                name: "edit_file".to_string(),
                description: "Replace the first occurrence of old_text with new_text in a file."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string",
                                 "description": "Absolute or workspace-relative file path."},
                        "old_text": {"type": "string", "description": "Exact text to replace."},
                        "new_text": {"type": "string", "description": "Replacement text."}
                    },
                    "required": ["path", "old_text", "new_text"]
                }),
            },
            ToolSchema {
                name: "run_command".to_string(),
                description: "Run a shell command in the workspace directory. Secrets are \
                              stripped from the environment. Commands time out after 30 seconds."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string", "description": "Shell command to execute."},
                        "timeout": {"type": "integer",
                                    "description": "Max seconds to wait (default 30, max 30).",
                                    "default": 30}
                    },
                    "required": ["command"]
                }),
            },
            ToolSchema {
                name: "search_apis".to_string(),
                description: "Search available APIs by intent or keyword. Returns matching \
                              service actions with parameters and auth info."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string",
                                  "description": "Natural language query describing the API capability needed."},
                        "top_k": {"type": "integer", "description": "Maximum results to return.",
                                  "default": 5}
                    },
                    "required": ["query"]
                }),
            },
            ToolSchema {
                name: "search_knowledge_base".to_string(),
                description: "Search the organization's knowledge base for policies, roles, \
                              systems, and procedures."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string",
                                  "description": "Natural language query describing the information needed."},
                        "top_k": {"type": "integer", "description": "Maximum results to return.",
                                  "default": 5}
                    },
                    "required": ["query"]
                }),
            },
        ]
    }

    /// Execute one tool call. `Err` carries the error text shown to the
    /// agent as a failed tool result.
    pub async fn execute(&self, name: &str, input: &Value) -> Result<String, String> {
        match name {
            "read_file" => self.read_file(input),
            "write_file" => self.write_file(input),
            "edit_file" => self.edit_file(input),
            "run_command" => self.run_command(input).await,
            "search_apis" => self.search_apis(input),
            "search_knowledge_base" => self.search_kb(input),
            other => Err(format!("Unknown tool: {other}")),
        }
    }

    // ------------------------------------------------------------------
    // File tools
    // ------------------------------------------------------------------

    /// Resolve a path and verify it stays inside the workspace.
    fn resolve_path(&self, raw: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        };
        let normalized = normalize(&joined);
        let root = normalize(&self.workspace);

        if !normalized.starts_with(&root) {
            return Err(format!("Path escapes workspace: {raw}"));
        }
        Ok(normalized)
    }

    fn read_file(&self, input: &Value) -> Result<String, String> {
        let path = self.resolve_path(str_arg(input, "path")?)?;
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()));
        }
        if path.is_dir() {
            return Err(format!("Path is a directory: {}", path.display()));
        }
        let size = std::fs::metadata(&path).map_err(|e| e.to_string())?.len() as usize;
        if size > MAX_OUTPUT_BYTES {
            return Err(format!(
                "File too large to read: {} ({size} bytes > {MAX_OUTPUT_BYTES} bytes)",
                path.display()
            ));
        }
        std::fs::read_to_string(&path).map_err(|e| e.to_string())
    }

    fn write_file(&self, input: &Value) -> Result<String, String> {
        let path = self.resolve_path(str_arg(input, "path")?)?;
        let content = input["content"].as_str().unwrap_or_default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&path, content).map_err(|e| e.to_string())?;
        Ok(format!("Wrote {} chars to {}", content.len(), path.display()))
    }

    fn edit_file(&self, input: &Value) -> Result<String, String> {
        let path = self.resolve_path(str_arg(input, "path")?)?;
        let old_text = str_arg(input, "old_text")?;
        let new_text = str_arg(input, "new_text")?;

        let current = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        if !current.contains(old_text) {
            return Err("old_text not found in file".to_string());
        }
        let updated = current.replacen(old_text, new_text, 1);
        std::fs::write(&path, updated).map_err(|e| e.to_string())?;
        Ok(format!("Edited file: {}", path.display()))
    }

    // ------------------------------------------------------------------
    // Command tool
    // ------------------------------------------------------------------

    async fn run_command(&self, input: &Value) -> Result<String, String> {
        let command = str_arg(input, "command")?;
        let timeout = input["timeout"]
            .as_u64()
            .unwrap_or(COMMAND_TIMEOUT_SECS)
            .clamp(1, COMMAND_TIMEOUT_SECS);

        let output = sandbox::run_command(&self.workspace, command, timeout)
            .await
            .map_err(|e| format!("Failed to start command: {e}"))?;

        if output.timed_out {
            return Ok(format!("Command timed out after {timeout}s"));
        }

        let mut parts = vec![format!("exit_code: {}", output.exit_code)];
        if !output.stdout.is_empty() {
            parts.push(format!("stdout:\n{}", output.stdout));
        }
        if !output.stderr.is_empty() {
            parts.push(format!("stderr:\n{}", output.stderr));
        }
        if output.truncated {
            parts.push(format!("... output truncated at {MAX_OUTPUT_BYTES} bytes"));
        }
        Ok(parts.join("\n"))
    }

    // ------------------------------------------------------------------
    // Discovery tools
    // ------------------------------------------------------------------

    fn search_apis(&self, input: &Value) -> Result<String, String> {
        let query = str_arg(input, "query")?;
        let top_k = input["top_k"].as_u64().unwrap_or(5) as usize;
        serde_json::to_string_pretty(&catalog::search_results_json(query, top_k))
            .map_err(|e| e.to_string())
    }

    fn search_kb(&self, input: &Value) -> Result<String, String> {
        let query = str_arg(input, "query")?;
        let top_k = input["top_k"].as_u64().unwrap_or(5) as usize;
        let results = match &self.kb_dir {
            Some(kb_dir) => kb::search_results_json(kb_dir, query, &self.team, top_k),
            None => json!([]),
        };
        serde_json::to_string_pretty(&results).map_err(|e| e.to_string())
    }
}

fn str_arg<'a>(input: &'a Value, key: &str) -> Result<&'a str, String> {
    input[key]
        .as_str()
        .ok_or_else(|| format!("Missing required argument: {key}"))
}

/// Lexically normalize a path: strip `.`, resolve `..` against parents.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> ToolRegistry {
        ToolRegistry::new(dir.path(), "default", None)
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);

        let msg = tools
            .execute(
                "write_file",
                &json!({"path": "workflow.json", "content": "{\"id\": \"wf\"}"}),
            )
            .await
            .unwrap();
        assert!(msg.starts_with("Wrote 12 chars"));

        let content = tools
            .execute("read_file", &json!({"path": "workflow.json"}))
            .await
            .unwrap();
        assert_eq!(content, "{\"id\": \"wf\"}");
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);
        tools
            .execute(
                "write_file",
                &json!({"path": "nested/deep/file.txt", "content": "x"}),
            )
            .await
            .unwrap();
        assert!(dir.path().join("nested/deep/file.txt").exists());
    }

    #[tokio::test]
    async fn edit_replaces_first_occurrence_only() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);
        tools
            .execute("write_file", &json!({"path": "f.txt", "content": "aba aba"}))
            .await
            .unwrap();
        tools
            .execute(
                "edit_file",
                &json!({"path": "f.txt", "old_text": "aba", "new_text": "xyz"}),
            )
            .await
            .unwrap();
        let content = tools
            .execute("read_file", &json!({"path": "f.txt"}))
            .await
            .unwrap();
        assert_eq!(content, "xyz aba");
    }

    #[tokio::test]
    async fn edit_missing_old_text_fails() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);
        tools
            .execute("write_file", &json!({"path": "f.txt", "content": "hello"}))
            .await
            .unwrap();
        let err = tools
            .execute(
                "edit_file",
                &json!({"path": "f.txt", "old_text": "nope", "new_text": "x"}),
            )
            .await
            .unwrap_err();
        assert!(err.contains("old_text not found"));
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);

        for path in ["../outside.txt", "/etc/passwd", "a/../../b.txt"] {
            let err = tools
                .execute("read_file", &json!({"path": path}))
                .await
                .unwrap_err();
            assert!(
                err.contains("escapes workspace"),
                "expected containment error for {path}, got: {err}"
            );
        }
    }

    #[tokio::test]
    async fn absolute_path_inside_workspace_is_allowed() {
        let dir = TempDir::new().unwrap();
        let tools = registry(&dir);
        let inside = dir.path().join("inside.txt");
        tools
            .execute(
                "write_file",
                &json!({"path": inside.to_str().unwrap(), "content": "ok"}),
            )
            .await
            .unwrap();
        assert!(inside.exists());
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = registry(&dir)
            .execute("read_file", &json!({"path": "nothing.txt"}))
            .await
            .unwrap_err();
        assert!(err.contains("File not found"));
    }

    #[tokio::test]
    async fn run_command_formats_output() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .execute("run_command", &json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert!(result.contains("exit_code: 0"));
        assert!(result.contains("stdout:\nhi"));
    }

    #[tokio::test]
    async fn search_apis_returns_json() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .execute("search_apis", &json!({"query": "slack invite", "top_k": 2}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed[0]["service"], "slack");
    }

    #[tokio::test]
    async fn search_kb_without_kb_dir_is_empty_list() {
        let dir = TempDir::new().unwrap();
        let result = registry(&dir)
            .execute("search_knowledge_base", &json!({"query": "policy"}))
            .await
            .unwrap();
        assert_eq!(result.trim(), "[]");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = registry(&dir)
            .execute("teleport", &json!({}))
            .await
            .unwrap_err();
        assert!(err.contains("Unknown tool"));
    }

    #[test]
    fn schemas_cover_default_toolset() {
        let dir = TempDir::new().unwrap();
        let schemas = registry(&dir).schemas();
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, DEFAULT_TOOL_NAMES);
    }
}
