//! File-backed workflow storage organized by team.
//!
//! Layout: one file per workflow version at
//! `<root>/<team>/<workflow-id>-v<version>.json`. Listing a team scans
//! `*.json` in descending file order and deduplicates by workflow id,
//! keeping the first (highest-version) occurrence.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FlowError;
use crate::workflow::Workflow;

/// Stores workflows as JSON files, organized by team.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    base_dir: PathBuf,
}

impl WorkflowStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn team_dir(&self, team: &str) -> PathBuf {
        self.base_dir.join(team)
    }

    /// Save a workflow and return its id.
    pub fn save(&self, workflow: &Workflow) -> Result<String, FlowError> {
        let team_dir = self.team_dir(&workflow.team);
        fs::create_dir_all(&team_dir)?;

        let filename = format!("{}-v{}.json", workflow.id, workflow.version);
        fs::write(team_dir.join(filename), workflow.to_json_pretty())?;
        Ok(workflow.id.clone())
    }

    /// Load the latest version of a workflow by id.
    pub fn load(&self, workflow_id: &str, team: &str) -> Result<Option<Workflow>, FlowError> {
        let prefix = format!("{workflow_id}-v");
        let mut matches = self.team_files(team)?;
        matches.retain(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        });
        // Descending file order: the highest version sorts last by name.
        matches.sort();
        let Some(path) = matches.pop() else {
            return Ok(None);
        };
        let workflow = Workflow::from_json(&fs::read_to_string(path)?)?;
        Ok(Some(workflow))
    }

    /// List all workflows for a team, latest version of each.
    pub fn list_by_team(&self, team: &str) -> Result<Vec<Workflow>, FlowError> {
        let mut files = self.team_files(team)?;
        files.sort();
        files.reverse();

        let mut seen = std::collections::HashSet::new();
        let mut workflows = Vec::new();
        for path in files {
            let workflow = Workflow::from_json(&fs::read_to_string(path)?)?;
            if seen.insert(workflow.id.clone()) {
                workflows.push(workflow);
            }
        }
        Ok(workflows)
    }

    /// Delete all versions of a workflow. Returns true if any existed.
    pub fn delete(&self, workflow_id: &str, team: &str) -> Result<bool, FlowError> {
        let prefix = format!("{workflow_id}-v");
        let mut deleted = false;
        for path in self.team_files(team)? {
            let is_version = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false);
            if is_version {
                fs::remove_file(path)?;
                deleted = true;
            }
        }
        Ok(deleted)
    }

    /// All `*.json` files in a team directory; missing directory → empty.
    fn team_files(&self, team: &str) -> Result<Vec<PathBuf>, FlowError> {
        let team_dir = self.team_dir(team);
        if !team_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(team_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workflow(id: &str, version: u32) -> Workflow {
        Workflow {
            id: id.to_string(),
            name: format!("{id} v{version}"),
            description: String::new(),
            team: "default".to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            parameters: Default::default(),
            version,
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());

        store.save(&workflow("day1-onboarding", 1)).unwrap();
        let loaded = store.load("day1-onboarding", "default").unwrap().unwrap();
        assert_eq!(loaded.id, "day1-onboarding");
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn load_returns_latest_version() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());

        store.save(&workflow("day1-onboarding", 1)).unwrap();
        store.save(&workflow("day1-onboarding", 2)).unwrap();
        store.save(&workflow("day1-onboarding", 3)).unwrap();

        let loaded = store.load("day1-onboarding", "default").unwrap().unwrap();
        assert_eq!(loaded.version, 3);
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());
        assert!(store.load("nothing", "default").unwrap().is_none());
        assert!(store.load("nothing", "no-team").unwrap().is_none());
    }

    #[test]
    fn list_by_team_deduplicates_by_id() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());

        store.save(&workflow("day1-onboarding", 1)).unwrap();
        store.save(&workflow("day1-onboarding", 2)).unwrap();
        store.save(&workflow("offboarding", 1)).unwrap();

        let listed = store.list_by_team("default").unwrap();
        assert_eq!(listed.len(), 2);
        let day1 = listed.iter().find(|w| w.id == "day1-onboarding").unwrap();
        assert_eq!(day1.version, 2);
    }

    #[test]
    fn delete_removes_all_versions() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());

        store.save(&workflow("day1-onboarding", 1)).unwrap();
        store.save(&workflow("day1-onboarding", 2)).unwrap();

        assert!(store.delete("day1-onboarding", "default").unwrap());
        assert!(store.load("day1-onboarding", "default").unwrap().is_none());
        assert!(!store.delete("day1-onboarding", "default").unwrap());
    }

    #[test]
    fn teams_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = WorkflowStore::new(dir.path());

        let mut wf = workflow("day1-onboarding", 1);
        wf.team = "engineering".to_string();
        store.save(&wf).unwrap();

        assert!(store.list_by_team("default").unwrap().is_empty());
        assert_eq!(store.list_by_team("engineering").unwrap().len(), 1);
    }
}
