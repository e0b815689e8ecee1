//! SOAR Service (spec §4.J): periodic loop that pulls new events,
//! evaluates them against the Playbook Engine, and runs triggered
//! actions.

use crate::actions::ActionExecutor;
use crate::engine::PlaybookEngine;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use orion_common::{event_types, OrionError, OrionResult, SecurityEvent, Severity};
use orion_events::Emitter;
use orion_logstore::LogStoreClient;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_QUERY_LIMIT: usize = 500;
pub const HIGH_WATER_MARK_BACKSTOP: Duration = Duration::hours(24);

#[derive(Debug, Clone)]
pub struct SoarServiceConfig {
    pub event_selector: String,
    pub query_limit: usize,
    /// Overrides every playbook's `dry_run` to true when set.
    pub global_dry_run: bool,
    pub high_water_mark_path: Option<PathBuf>,
}

impl Default for SoarServiceConfig {
    fn default() -> Self {
        Self {
            event_selector: r#"{app="orion-sentinel"}"#.to_string(),
            query_limit: DEFAULT_QUERY_LIMIT,
            global_dry_run: false,
            high_water_mark_path: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SoarTickStats {
    pub events_seen: usize,
    pub playbooks_triggered: usize,
    pub actions_executed: usize,
    pub actions_failed: usize,
}

pub struct SoarService {
    log_store: Arc<dyn LogStoreClient>,
    emitter: Arc<Emitter>,
    engine: Arc<PlaybookEngine>,
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
    config: SoarServiceConfig,
}

impl SoarService {
    pub fn new(
        log_store: Arc<dyn LogStoreClient>,
        emitter: Arc<Emitter>,
        engine: Arc<PlaybookEngine>,
        executors: Vec<Arc<dyn ActionExecutor>>,
        config: SoarServiceConfig,
    ) -> Self {
        let executors = executors.into_iter().map(|e| (e.kind().to_string(), e)).collect();
        Self {
            log_store,
            emitter,
            engine,
            executors,
            config,
        }
    }

    /// Load the persisted high-water-mark, bounded to `now - 24h` so a
    /// long outage doesn't trigger a replay storm on restart (spec §4.J).
    pub async fn load_high_water_mark(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let floor = now - HIGH_WATER_MARK_BACKSTOP;
        let Some(path) = &self.config.high_water_mark_path else {
            return floor;
        };
        match read_high_water_mark(path).await {
            Some(mark) => mark.max(floor),
            None => floor,
        }
    }

    async fn persist_high_water_mark(&self, mark: DateTime<Utc>) {
        let Some(path) = &self.config.high_water_mark_path else {
            return;
        };
        if let Err(e) = write_high_water_mark(path, mark).await {
            tracing::warn!(error = %e, "failed to persist soar high-water-mark");
        }
    }

    pub async fn run_tick(&self, high_water_mark: DateTime<Utc>, now: DateTime<Utc>) -> OrionResult<(SoarTickStats, DateTime<Utc>)> {
        let records = self
            .log_store
            .query(&self.config.event_selector, high_water_mark, now, self.config.query_limit)
            .await?;

        let mut events: Vec<SecurityEvent> = records
            .iter()
            .filter_map(|record| match serde_json::from_str::<SecurityEvent>(&record.line) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping record that isn't a SecurityEvent");
                    None
                }
            })
            .filter(|event| event.timestamp > high_water_mark)
            .collect();
        events.sort_by_key(|e| e.timestamp);

        let mut stats = SoarTickStats::default();
        let mut new_mark = high_water_mark;

        for event in &events {
            stats.events_seen += 1;
            let triggered = self.engine.evaluate(event);
            stats.playbooks_triggered += triggered.len();

            for triggered_playbook in triggered {
                let dry_run = self.config.global_dry_run || triggered_playbook.dry_run;
                for action in &triggered_playbook.actions {
                    let (success, receipt) = self.run_action(action, dry_run).await;
                    if success {
                        stats.actions_executed += 1;
                    } else {
                        stats.actions_failed += 1;
                    }
                    self.emit_soar_action(&triggered_playbook.playbook_id, action, success, dry_run, receipt);
                    if !success && action.critical {
                        break;
                    }
                }
            }
            new_mark = new_mark.max(event.timestamp);
        }

        self.persist_high_water_mark(new_mark).await;
        Ok((stats, new_mark))
    }

    async fn run_action(
        &self,
        action: &crate::engine::ResolvedAction,
        dry_run: bool,
    ) -> (bool, crate::actions::ActionReceipt) {
        let Some(executor) = self.executors.get(&action.kind) else {
            let receipt = crate::actions::ActionReceipt {
                success: false,
                retry_hint: false,
                details: serde_json::json!({"error": format!("no executor registered for kind {}", action.kind)}),
                duration_ms: 0,
            };
            return (false, receipt);
        };
        if let Err(reason) = executor.validate(&action.parameters) {
            let receipt = crate::actions::ActionReceipt {
                success: false,
                retry_hint: false,
                details: serde_json::json!({"error": reason}),
                duration_ms: 0,
            };
            return (false, receipt);
        }
        let receipt = executor.execute(&action.parameters, dry_run).await;
        (receipt.success, receipt)
    }

    fn emit_soar_action(
        &self,
        playbook_id: &str,
        action: &crate::engine::ResolvedAction,
        success: bool,
        dry_run: bool,
        receipt: crate::actions::ActionReceipt,
    ) {
        let parameters_digest = parameters_digest(&action.parameters);
        let event = SecurityEvent::builder(event_types::SOAR_ACTION, if success { Severity::Info } else { Severity::Medium })
            .title(format!("{} via {playbook_id}", action.kind))
            .description(format!("soar action {} dry_run={dry_run}", action.kind))
            .metadata("playbook_id".to_string(), serde_json::json!(playbook_id))
            .metadata("action_kind".to_string(), serde_json::json!(action.kind))
            .metadata("parameters_digest".to_string(), serde_json::json!(parameters_digest))
            .metadata("success".to_string(), serde_json::json!(success))
            .metadata("dry_run".to_string(), serde_json::json!(dry_run))
            .metadata("duration_ms".to_string(), serde_json::json!(receipt.duration_ms))
            .metadata("receipt".to_string(), receipt.details)
            .build();
        self.emitter.emit_with_component(event, Some("soar"));
    }
}

fn parameters_digest(parameters: &HashMap<String, String>) -> String {
    use sha2::{Digest, Sha256};
    let mut keys: Vec<&String> = parameters.keys().collect();
    keys.sort();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(parameters[key].as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

async fn read_high_water_mark(path: &Path) -> Option<DateTime<Utc>> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.with_timezone(&Utc))
}

async fn write_high_water_mark(path: &Path, mark: DateTime<Utc>) -> OrionResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(OrionError::Io)?;
    }
    tokio::fs::write(path, mark.to_rfc3339()).await.map_err(OrionError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::SimulateOnlyExecutor;
    use crate::playbook::{ConditionOperator, Playbook, PlaybookActionSpec, PlaybookCondition};
    use orion_logstore::InMemoryLogStore;

    fn playbook() -> Playbook {
        Playbook {
            id: "notify-on-match".to_string(),
            name: "Notify".to_string(),
            description: String::new(),
            enabled: true,
            priority: 10,
            dry_run: false,
            trigger: event_types::INTEL_MATCH.to_string(),
            conditions: vec![PlaybookCondition {
                path: "severity".to_string(),
                op: ConditionOperator::Equals,
                value: serde_json::json!("high"),
                negate: false,
            }],
            actions: vec![PlaybookActionSpec {
                kind: "simulate-only".to_string(),
                parameters: HashMap::new(),
                critical: false,
            }],
        }
    }

    #[tokio::test]
    async fn scenario_soar_processes_new_event_and_advances_mark() {
        let log_store = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(log_store.clone(), "orion-sentinel"));
        let engine = Arc::new(PlaybookEngine::new(vec![playbook()]));
        let executors: Vec<Arc<dyn ActionExecutor>> = vec![Arc::new(SimulateOnlyExecutor)];
        let service = SoarService::new(
            log_store.clone(),
            emitter,
            engine,
            executors,
            SoarServiceConfig::default(),
        );

        let now = Utc::now();
        let event = SecurityEvent::builder(event_types::INTEL_MATCH, Severity::High)
            .title("match")
            .timestamp(now)
            .build();
        log_store
            .push(&[("app".to_string(), "orion-sentinel".to_string())], vec![serde_json::to_string(&event).unwrap()])
            .await
            .unwrap();

        let (stats, new_mark) = service.run_tick(now - Duration::minutes(1), now + Duration::minutes(1)).await.unwrap();
        assert_eq!(stats.events_seen, 1);
        assert_eq!(stats.playbooks_triggered, 1);
        assert_eq!(stats.actions_executed, 1);
        assert_eq!(new_mark, now);
    }

    #[tokio::test]
    async fn high_water_mark_restart_is_bounded_to_24h() {
        let log_store = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(log_store.clone(), "orion-sentinel"));
        let engine = Arc::new(PlaybookEngine::empty());
        let dir = std::env::temp_dir().join(format!("orion-soar-hwm-{}", uuid_like()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let hwm_path = dir.join("hwm.txt");

        let now = Utc::now();
        let stale_mark = now - Duration::days(10);
        write_high_water_mark(&hwm_path, stale_mark).await.unwrap();

        let service = SoarService::new(
            log_store,
            emitter,
            engine,
            vec![],
            SoarServiceConfig {
                high_water_mark_path: Some(hwm_path),
                ..Default::default()
            },
        );

        let loaded = service.load_high_water_mark(now).await;
        assert!(loaded > stale_mark);
        assert_eq!(loaded, now - HIGH_WATER_MARK_BACKSTOP);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    fn uuid_like() -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    }
}
