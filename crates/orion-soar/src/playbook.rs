//! Playbook model (spec §3, §4.H): loaded from a declarative file,
//! held behind a copy-on-reload set so an in-flight evaluation is
//! never invalidated by a reload.

use orion_common::OrionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    In,
    Contains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookCondition {
    pub path: String,
    pub op: ConditionOperator,
    pub value: serde_json::Value,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookActionSpec {
    pub kind: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub critical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub dry_run: bool,
    pub trigger: String,
    #[serde(default)]
    pub conditions: Vec<PlaybookCondition>,
    pub actions: Vec<PlaybookActionSpec>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PlaybookFile {
    #[serde(default)]
    playbooks: Vec<Playbook>,
}

/// Parse a playbooks file (JSON or YAML, sniffed by extension, falling
/// back to JSON-then-YAML attempts for extension-less paths).
pub fn parse_playbook_document(raw: &str, is_yaml: bool) -> Result<Vec<Playbook>, OrionError> {
    let file: PlaybookFile = if is_yaml {
        serde_yaml::from_str(raw).map_err(|e| OrionError::Invalid(format!("playbooks YAML: {e}")))?
    } else {
        serde_json::from_str(raw).map_err(|e| OrionError::Invalid(format!("playbooks JSON: {e}")))?
    };
    validate_playbooks(&file.playbooks)?;
    Ok(file.playbooks)
}

pub fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn validate_playbooks(playbooks: &[Playbook]) -> Result<(), OrionError> {
    let mut seen_ids = std::collections::HashSet::new();
    for playbook in playbooks {
        if !seen_ids.insert(playbook.id.clone()) {
            return Err(OrionError::Invalid(format!("duplicate playbook id: {}", playbook.id)));
        }
        if playbook.actions.is_empty() {
            return Err(OrionError::Invalid(format!("playbook {} has no actions", playbook.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_json_playbook() {
        let raw = r#"{"playbooks":[{
            "id":"block-high-confidence","name":"Block","trigger":"intel_match",
            "conditions":[{"path":"metadata.confidence","op":">=","value":0.9}],
            "actions":[{"kind":"block-domain","parameters":{"domain":"{{event.domain}}"}}],
            "priority":100
        }]}"#;
        let playbooks = parse_playbook_document(raw, false).unwrap();
        assert_eq!(playbooks.len(), 1);
        assert_eq!(playbooks[0].priority, 100);
        assert!(playbooks[0].enabled);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"{"playbooks":[
            {"id":"a","name":"A","trigger":"intel_match","actions":[{"kind":"simulate-only","parameters":{}}]},
            {"id":"a","name":"B","trigger":"intel_match","actions":[{"kind":"simulate-only","parameters":{}}]}
        ]}"#;
        assert!(parse_playbook_document(raw, false).is_err());
    }

    #[test]
    fn rejects_playbook_with_no_actions() {
        let raw = r#"{"playbooks":[{"id":"a","name":"A","trigger":"intel_match","actions":[]}]}"#;
        assert!(parse_playbook_document(raw, false).is_err());
    }

    #[test]
    fn parses_yaml_document() {
        let raw = "playbooks:\n  - id: a\n    name: A\n    trigger: intel_match\n    actions:\n      - kind: simulate-only\n";
        let playbooks = parse_playbook_document(raw, true).unwrap();
        assert_eq!(playbooks.len(), 1);
    }
}
