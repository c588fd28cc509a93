//! Knowledge-base assembly and search.
//!
//! The KB is a directory of markdown files: `<kb_dir>/default/*.md` plus
//! optional per-team directories whose files override same-named defaults.
//! Files are split into sections on `##` headings; the
//! `search_knowledge_base` tool scores sections by keyword overlap.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

/// One KB section: a `##` heading and its body.
#[derive(Debug, Clone, Serialize)]
pub struct KbSection {
    pub file: String,
    pub heading: String,
    pub content: String,
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^## +(.+)$").expect("static regex"));

fn tokenize(text: &str) -> std::collections::HashSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Title-case a file name: "onboarding_policy.md" → "Onboarding Policy".
fn title_from_filename(name: &str) -> String {
    name.trim_end_matches(".md")
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collect KB files: defaults first, overridden by team-specific files
/// with the same name.
fn collect_files(kb_dir: &Path, team: &str) -> BTreeMap<String, PathBuf> {
    let mut files = BTreeMap::new();

    let mut dirs = vec![kb_dir.join("default")];
    if team != "default" {
        dirs.push(kb_dir.join(team));
    }

    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.insert(name.to_string(), path);
                }
            }
        }
    }

    files
}

/// Load all KB sections for a team, split on `##` headings. Content
/// before the first heading becomes a section titled after the file.
pub fn load_kb_sections(kb_dir: &Path, team: &str) -> Vec<KbSection> {
    let mut sections = Vec::new();

    for (name, path) in collect_files(kb_dir, team) {
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };

        let mut matches: Vec<(usize, usize, String)> = HEADING
            .captures_iter(&content)
            .map(|cap| {
                let whole = cap.get(0).expect("regex group 0");
                (whole.start(), whole.end(), cap[1].trim().to_string())
            })
            .collect();

        let preamble_end = matches.first().map(|(s, _, _)| *s).unwrap_or(content.len());
        let preamble = content[..preamble_end].trim();
        if !preamble.is_empty() {
            sections.push(KbSection {
                file: name.clone(),
                heading: title_from_filename(&name),
                content: preamble.to_string(),
            });
        }

        matches.push((content.len(), content.len(), String::new()));
        for window in matches.windows(2) {
            let (_, body_start, ref heading) = window[0];
            let (next_start, _, _) = window[1];
            if heading.is_empty() {
                continue;
            }
            sections.push(KbSection {
                file: name.clone(),
                heading: heading.clone(),
                content: content[body_start..next_start].trim().to_string(),
            });
        }
    }

    sections
}

/// Search KB sections by keyword overlap with the query.
pub fn search_knowledge_base(
    kb_dir: &Path,
    query: &str,
    team: &str,
    top_k: usize,
) -> Vec<KbSection> {
    let sections = load_kb_sections(kb_dir, team);
    let query_tokens = tokenize(query);

    if query_tokens.is_empty() {
        return sections.into_iter().take(top_k).collect();
    }

    let mut scored: Vec<(usize, usize, KbSection)> = sections
        .into_iter()
        .enumerate()
        .filter_map(|(idx, section)| {
            let section_tokens = tokenize(&format!("{} {}", section.heading, section.content));
            let overlap = query_tokens.intersection(&section_tokens).count();
            (overlap > 0).then_some((overlap, idx, section))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(top_k).map(|(_, _, s)| s).collect()
}

/// JSON rendering for the `search_knowledge_base` tool result.
pub fn search_results_json(kb_dir: &Path, query: &str, team: &str, top_k: usize) -> Value {
    json!(search_knowledge_base(kb_dir, query, team, top_k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_kb() -> TempDir {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("default");
        std::fs::create_dir_all(&default).unwrap();
        std::fs::write(
            default.join("onboarding_policy.md"),
            "General onboarding notes.\n\n## Accounts\n\nEvery new hire needs HR, \
             Google, and Slack accounts.\n\n## Equipment\n\nLaptops are ordered via Jira.\n",
        )
        .unwrap();
        std::fs::write(
            default.join("security.md"),
            "## Access Control\n\nRepository access requires org membership.\n",
        )
        .unwrap();

        let engineering = dir.path().join("engineering");
        std::fs::create_dir_all(&engineering).unwrap();
        std::fs::write(
            engineering.join("security.md"),
            "## Access Control\n\nEngineers additionally need GitHub org access on day one.\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn sections_split_on_headings_with_preamble() {
        let kb = seed_kb();
        let sections = load_kb_sections(kb.path(), "default");

        let policy: Vec<_> = sections
            .iter()
            .filter(|s| s.file == "onboarding_policy.md")
            .collect();
        assert_eq!(policy.len(), 3);
        assert_eq!(policy[0].heading, "Onboarding Policy");
        assert!(policy[0].content.contains("General onboarding notes"));
        assert_eq!(policy[1].heading, "Accounts");
        assert_eq!(policy[2].heading, "Equipment");
        assert!(policy[2].content.contains("Jira"));
    }

    #[test]
    fn team_files_override_defaults() {
        let kb = seed_kb();
        let sections = load_kb_sections(kb.path(), "engineering");
        let security: Vec<_> = sections.iter().filter(|s| s.file == "security.md").collect();
        assert_eq!(security.len(), 1);
        assert!(security[0].content.contains("Engineers additionally"));
    }

    #[test]
    fn search_scores_by_overlap() {
        let kb = seed_kb();
        let results = search_knowledge_base(kb.path(), "laptop equipment order", "default", 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].heading, "Equipment");
    }

    #[test]
    fn search_no_match_returns_empty() {
        let kb = seed_kb();
        let results = search_knowledge_base(kb.path(), "zzzz", "default", 3);
        assert!(results.is_empty());
    }

    #[test]
    fn missing_kb_dir_yields_no_sections() {
        let dir = TempDir::new().unwrap();
        let sections = load_kb_sections(&dir.path().join("nope"), "default");
        assert!(sections.is_empty());
    }

    #[test]
    fn title_case_helper() {
        assert_eq!(title_from_filename("onboarding_policy.md"), "Onboarding Policy");
        assert_eq!(title_from_filename("security.md"), "Security");
    }
}
