//! Playbook Engine (spec §4.H): evaluates the loaded, copy-on-reload
//! playbook set against an event and resolves triggered actions'
//! templated parameters. Never executes actions itself.

use crate::playbook::{parse_playbook_document, is_yaml_path, ConditionOperator, Playbook, PlaybookActionSpec};
use arc_swap::ArcSwap;
use orion_common::json_path::{get_path, stringify_path, MISSING};
use orion_common::{OrionError, SecurityEvent};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A triggered playbook paired with its actions, parameters already
/// resolved against the event that matched it.
#[derive(Debug, Clone)]
pub struct TriggeredPlaybook {
    pub playbook_id: String,
    pub priority: i64,
    pub dry_run: bool,
    pub actions: Vec<ResolvedAction>,
}

#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub kind: String,
    pub parameters: HashMap<String, String>,
    pub critical: bool,
}

pub struct PlaybookEngine {
    playbooks: ArcSwap<Vec<Playbook>>,
    source_path: Option<PathBuf>,
}

impl PlaybookEngine {
    pub fn new(playbooks: Vec<Playbook>) -> Self {
        Self {
            playbooks: ArcSwap::from_pointee(playbooks),
            source_path: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load from a file at startup; the loaded path is remembered so
    /// `reload()` can be called without arguments later.
    pub async fn load(path: &Path) -> Result<Self, OrionError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(OrionError::Io)?;
        let playbooks = parse_playbook_document(&raw, is_yaml_path(path))?;
        Ok(Self {
            playbooks: ArcSwap::from_pointee(playbooks),
            source_path: Some(path.to_path_buf()),
        })
    }

    /// Atomic reload: the new set only becomes visible after it parses
    /// successfully (spec §4.H); a parse failure leaves the prior set
    /// active.
    pub async fn reload(&self) -> Result<(), OrionError> {
        let Some(path) = &self.source_path else {
            return Err(OrionError::Invalid("playbook engine has no source path to reload from".to_string()));
        };
        let raw = tokio::fs::read_to_string(path).await.map_err(OrionError::Io)?;
        let playbooks = parse_playbook_document(&raw, is_yaml_path(path))?;
        self.playbooks.store(Arc::new(playbooks));
        Ok(())
    }

    pub fn trigger_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .playbooks
            .load()
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.trigger.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Evaluate `event` against the currently loaded set, returning
    /// matches sorted by priority descending, identifier ascending.
    pub fn evaluate(&self, event: &SecurityEvent) -> Vec<TriggeredPlaybook> {
        let event_value = serde_json::to_value(event).unwrap_or(Value::Null);
        let snapshot = self.playbooks.load();

        let mut matches: Vec<&Playbook> = snapshot
            .iter()
            .filter(|p| p.enabled && p.trigger == event.event_type)
            .filter(|p| p.conditions.iter().all(|c| evaluate_condition(&event_value, c)))
            .collect();

        matches.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        matches
            .into_iter()
            .map(|playbook| TriggeredPlaybook {
                playbook_id: playbook.id.clone(),
                priority: playbook.priority,
                dry_run: playbook.dry_run,
                actions: playbook
                    .actions
                    .iter()
                    .map(|action| resolve_action(action, &event_value))
                    .collect(),
            })
            .collect()
    }
}

fn resolve_action(spec: &PlaybookActionSpec, event_value: &Value) -> ResolvedAction {
    let parameters = spec
        .parameters
        .iter()
        .map(|(k, v)| (k.clone(), resolve_template(v, event_value)))
        .collect();
    ResolvedAction {
        kind: spec.kind.clone(),
        parameters,
        critical: spec.critical,
    }
}

/// Substitute every `{{event.<path>}}` occurrence in `template`.
/// Malformed placeholders (not matching the `event.` prefix) resolve
/// to the empty string and are logged; a well-formed placeholder whose
/// path doesn't resolve yields the `"missing"` sentinel, same as any
/// other condition lookup.
fn resolve_template(template: &str, event_value: &Value) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = after_open[..end].trim();
        if let Some(path) = inner.strip_prefix("event.") {
            output.push_str(&stringify_path(event_value, path));
        } else {
            tracing::warn!(template = inner, "unresolved playbook template, substituting empty string");
        }
        rest = &after_open[end + 2..];
    }
    output.push_str(rest);
    output
}

fn evaluate_condition(event_value: &Value, condition: &crate::playbook::PlaybookCondition) -> bool {
    let resolved = get_path(event_value, &condition.path);
    let sentinel = Value::String(MISSING.to_string());
    let subject = resolved.unwrap_or(&sentinel);
    let raw = compare(subject, condition.op, &condition.value);
    if condition.negate {
        !raw
    } else {
        raw
    }
}

fn compare(subject: &Value, op: ConditionOperator, target: &Value) -> bool {
    match op {
        ConditionOperator::Equals => subject == target,
        ConditionOperator::NotEquals => subject != target,
        ConditionOperator::Ge | ConditionOperator::Le | ConditionOperator::Gt | ConditionOperator::Lt => {
            match (as_f64(subject), as_f64(target)) {
                (Some(a), Some(b)) => match op {
                    ConditionOperator::Ge => a >= b,
                    ConditionOperator::Le => a <= b,
                    ConditionOperator::Gt => a > b,
                    ConditionOperator::Lt => a < b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
        ConditionOperator::In => match target {
            Value::Array(items) => items.iter().any(|item| item == subject),
            _ => false,
        },
        ConditionOperator::Contains => match subject {
            Value::String(s) => target.as_str().map(|t| s.contains(t)).unwrap_or(false),
            Value::Array(items) => items.iter().any(|item| item == target),
            _ => false,
        },
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
