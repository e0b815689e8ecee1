//! Inventory Collector (spec §4.E): periodic flow/DNS scan -> Device
//! Store upserts -> `new_device` lifecycle events.

use crate::observation::extract_observation;
use crate::store::DeviceStore;
use chrono::{DateTime, Duration, Utc};
use orion_common::{event_types, OrionResult, SecurityEvent, Severity};
use orion_events::Emitter;
use orion_logstore::LogStoreClient;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// How far back to look each tick (spec §4.E default 10 minutes
    /// between ticks; lookback is independently configurable).
    pub lookback: Duration,
    pub flow_selector: String,
    pub dns_selector: String,
    pub query_limit: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::minutes(10),
            flow_selector: "{record_type=\"flow\"}".to_string(),
            dns_selector: "{record_type=\"dns\"}".to_string(),
            query_limit: 5000,
        }
    }
}

/// Summary of one tick, used by tests and health reporting.
#[derive(Debug, Default, Clone)]
pub struct TickStats {
    pub observations_seen: usize,
    pub observations_dropped: usize,
    pub devices_created: usize,
}

pub struct InventoryCollector {
    log_store: Arc<dyn LogStoreClient>,
    emitter: Arc<Emitter>,
    config: CollectorConfig,
}

impl InventoryCollector {
    pub fn new(log_store: Arc<dyn LogStoreClient>, emitter: Arc<Emitter>, config: CollectorConfig) -> Self {
        Self {
            log_store,
            emitter,
            config,
        }
    }

    /// Run a single collection tick against `store` (spec §4.E
    /// numbered steps). Transport errors propagate so the caller
    /// (scheduler) retries the whole tick next interval; a single
    /// record parse error is logged and skipped.
    pub async fn run_tick(&self, store: &DeviceStore, now: DateTime<Utc>) -> OrionResult<TickStats> {
        let start = now - self.config.lookback;

        let flow_records = self
            .log_store
            .query(&self.config.flow_selector, start, now, self.config.query_limit)
            .await?;
        let dns_records = self
            .log_store
            .query(&self.config.dns_selector, start, now, self.config.query_limit)
            .await?;

        let mut stats = TickStats::default();
        let mut observations = Vec::with_capacity(flow_records.len() + dns_records.len());

        for record in flow_records.into_iter().chain(dns_records.into_iter()) {
            stats.observations_seen += 1;
            match extract_observation(&record.line) {
                Ok(obs) => observations.push(obs),
                Err(e) => {
                    stats.observations_dropped += 1;
                    tracing::debug!(error = %e, "dropping unparseable observation");
                }
            }
        }

        // Process oldest-first so that, per spec §4.E tie-break, the
        // most recent observation for a MAC wins the current-IP slot.
        observations.sort_by_key(|o| o.timestamp);

        for obs in observations {
            let (device, created) = store.upsert_from_observation(
                &obs.ip,
                obs.mac.as_deref(),
                obs.hostname.as_deref(),
                obs.timestamp,
            );
            if created {
                stats.devices_created += 1;
                let event = SecurityEvent::builder(event_types::NEW_DEVICE, Severity::Info)
                    .title(format!("New device discovered: {}", device.current_ip))
                    .description(format!(
                        "Device {} first observed at {}",
                        device.identifier, device.first_seen
                    ))
                    .device_id(device.identifier.clone())
                    .source_ip(device.current_ip.clone())
                    .build();
                self.emitter.emit_with_component(event, Some("inventory"));
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_logstore::InMemoryLogStore;

    async fn seed_store(lines: &[(&str, &str)], store: &InMemoryLogStore) {
        for (selector_kind, line) in lines {
            let labels = vec![("record_type".to_string(), selector_kind.to_string())];
            store.push(&labels, vec![line.to_string()]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn scenario_inventory_discovery() {
        // Seed test 1 from spec §8.
        let log_store = Arc::new(InMemoryLogStore::new());
        seed_store(
            &[
                (
                    "flow",
                    r#"{"src_ip":"192.168.1.50","dest_ip":"1.1.1.1","flow":{"bytes_toserver":120},"ts":"2024-01-15T10:00:00Z"}"#,
                ),
                (
                    "flow",
                    r#"{"src_ip":"192.168.1.50","dest_ip":"8.8.8.8","flow":{"bytes_toserver":80},"ts":"2024-01-15T10:01:00Z"}"#,
                ),
            ],
            &log_store,
        )
        .await;

        let event_sink = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(event_sink.clone(), "orion-sentinel"));
        let collector = InventoryCollector::new(log_store, emitter.clone(), CollectorConfig::default());

        let device_store = DeviceStore::new();
        let now = DateTime::parse_from_rfc3339("2024-01-15T10:02:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let stats = collector.run_tick(&device_store, now).await.unwrap();

        assert_eq!(stats.devices_created, 1);
        assert_eq!(device_store.len(), 1);
        let device = device_store.get("ip:192.168.1.50").unwrap();
        assert_eq!(
            device.first_seen,
            DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z").unwrap()
        );
        assert_eq!(
            device.last_seen,
            DateTime::parse_from_rfc3339("2024-01-15T10:01:00Z").unwrap()
        );

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(event_sink.len(), 1);
    }

    #[tokio::test]
    async fn repeat_tick_does_not_re_emit_new_device() {
        let log_store = Arc::new(InMemoryLogStore::new());
        seed_store(
            &[(
                "flow",
                r#"{"src_ip":"192.168.1.50","dest_ip":"1.1.1.1","ts":"2024-01-15T10:00:00Z"}"#,
            )],
            &log_store,
        )
        .await;

        let event_sink = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(event_sink.clone(), "orion-sentinel"));
        let collector = InventoryCollector::new(log_store, emitter, CollectorConfig::default());
        let device_store = DeviceStore::new();

        let now = DateTime::parse_from_rfc3339("2024-01-15T10:02:00Z")
            .unwrap()
            .with_timezone(&Utc);
        collector.run_tick(&device_store, now).await.unwrap();
        let stats2 = collector.run_tick(&device_store, now).await.unwrap();
        assert_eq!(stats2.devices_created, 0);
    }

    #[tokio::test]
    async fn malformed_record_is_skipped_not_fatal() {
        let log_store = Arc::new(InMemoryLogStore::new());
        seed_store(&[("flow", "not json")], &log_store).await;

        let event_sink = Arc::new(InMemoryLogStore::new());
        let emitter = Arc::new(Emitter::new(event_sink, "orion-sentinel"));
        let collector = InventoryCollector::new(log_store, emitter, CollectorConfig::default());
        let device_store = DeviceStore::new();

        let stats = collector.run_tick(&device_store, Utc::now()).await.unwrap();
        assert_eq!(stats.observations_dropped, 1);
        assert_eq!(device_store.len(), 0);
    }
}
