//! Health-Score Service (spec §4.K): periodic tick that gathers
//! metrics, scores them, and emits a `security_health_update` event.

use crate::metrics::{gather_metrics, HygieneFlags};
use crate::scoring::{score, HealthReport, ScoringThresholds};
use chrono::Utc;
use orion_common::{event_types, OrionResult, SecurityEvent, Severity};
use orion_events::Emitter;
use orion_inventory::DeviceStore;
use orion_logstore::LogStoreClient;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HealthServiceConfig {
    pub thresholds: ScoringThresholds,
    pub hygiene: HygieneFlags,
}

impl Default for HealthServiceConfig {
    fn default() -> Self {
        Self {
            thresholds: ScoringThresholds::default(),
            hygiene: HygieneFlags::default(),
        }
    }
}

pub struct HealthService {
    devices: Arc<DeviceStore>,
    log_store: Arc<dyn LogStoreClient>,
    emitter: Arc<Emitter>,
    config: HealthServiceConfig,
}

impl HealthService {
    pub fn new(
        devices: Arc<DeviceStore>,
        log_store: Arc<dyn LogStoreClient>,
        emitter: Arc<Emitter>,
        config: HealthServiceConfig,
    ) -> Self {
        Self {
            devices,
            log_store,
            emitter,
            config,
        }
    }

    pub async fn run_tick(&self) -> OrionResult<HealthReport> {
        let now = Utc::now();
        let metrics = gather_metrics(&self.devices, self.log_store.as_ref(), self.config.hygiene, now).await?;
        let report = score(&metrics, &self.config.thresholds);

        let severity = match report.grade {
            crate::scoring::Grade::A | crate::scoring::Grade::B => Severity::Info,
            crate::scoring::Grade::C | crate::scoring::Grade::D => Severity::Medium,
            crate::scoring::Grade::F => Severity::High,
        };

        let event = SecurityEvent::builder(event_types::SECURITY_HEALTH_UPDATE, severity)
            .title(format!("Security health: {} ({})", report.composite, report.grade.as_str()))
            .description(report.recommendations.join("; "))
            .risk_score(1.0 - (report.composite as f64 / 100.0))
            .reasons(report.recommendations.clone())
            .metadata("composite".to_string(), serde_json::json!(report.composite))
            .metadata("grade".to_string(), serde_json::json!(report.grade))
            .metadata("inventory".to_string(), serde_json::to_value(&report.inventory).unwrap_or_default())
            .metadata("threat".to_string(), serde_json::to_value(&report.threat).unwrap_or_default())
            .metadata("change".to_string(), serde_json::to_value(&report.change).unwrap_or_default())
            .metadata("hygiene".to_string(), serde_json::to_value(&report.hygiene).unwrap_or_default())
            .build();

        self.emitter.emit_with_component(event, Some("health"));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_logstore::InMemoryLogStore;

    #[tokio::test]
    async fn scenario_health_score_emits_update_event() {
        let devices = Arc::new(DeviceStore::new());
        for i in 0..3 {
            devices.upsert_from_observation(&format!("192.168.1.{}", 10 + i), None, None, Utc::now());
        }
        let log_store = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(log_store.clone(), "orion-sentinel"));

        let service = HealthService::new(
            devices,
            log_store.clone(),
            emitter,
            HealthServiceConfig {
                thresholds: ScoringThresholds::default(),
                hygiene: HygieneFlags {
                    backups_ok: true,
                    updates_current: true,
                    firewall_enabled: true,
                },
            },
        );

        let report = service.run_tick().await.unwrap();
        assert_eq!(report.composite, 96);
        assert_eq!(report.grade.as_str(), "A");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(log_store.len(), 1);
    }
}
