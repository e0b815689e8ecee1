//! Action Executors (spec §4.I): one executor per action kind, each
//! validated before a playbook is trusted and each returning a receipt
//! rather than propagating an error — the SOAR service never aborts a
//! run because an action threw.

use async_trait::async_trait;
use orion_inventory::DeviceStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ActionReceipt {
    pub success: bool,
    pub retry_hint: bool,
    pub details: Value,
    pub duration_ms: u64,
}

impl ActionReceipt {
    fn ok(details: Value, elapsed: Instant) -> Self {
        Self {
            success: true,
            retry_hint: false,
            details,
            duration_ms: elapsed.elapsed().as_millis() as u64,
        }
    }

    fn failed(details: Value, retry_hint: bool, elapsed: Instant) -> Self {
        Self {
            success: false,
            retry_hint,
            details,
            duration_ms: elapsed.elapsed().as_millis() as u64,
        }
    }

    fn dry_run(kind: &str, parameters: &HashMap<String, String>) -> Self {
        Self {
            success: true,
            retry_hint: false,
            details: serde_json::json!({"action": kind, "dry_run": true, "parameters": parameters}),
            duration_ms: 0,
        }
    }
}

/// An action kind pluggable into the SOAR loop (spec §4.I).
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn kind(&self) -> &str;

    /// Called at playbook load and before every execution.
    fn validate(&self, parameters: &HashMap<String, String>) -> Result<(), String>;

    /// Never returns `Err` — all failure modes are encoded in the
    /// receipt so a single bad action can't abort the SOAR tick.
    async fn execute(&self, parameters: &HashMap<String, String>, dry_run: bool) -> ActionReceipt;
}

fn require<'a>(parameters: &'a HashMap<String, String>, key: &str) -> Result<&'a str, String> {
    parameters
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing required parameter: {key}"))
}

/// Calls a DNS-sink API to add a domain to its blocklist.
pub struct BlockDomainExecutor {
    sink_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl BlockDomainExecutor {
    pub fn new(sink_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            sink_url: sink_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ActionExecutor for BlockDomainExecutor {
    fn kind(&self) -> &str {
        "block-domain"
    }

    fn validate(&self, parameters: &HashMap<String, String>) -> Result<(), String> {
        require(parameters, "domain").map(|_| ())
    }

    async fn execute(&self, parameters: &HashMap<String, String>, dry_run: bool) -> ActionReceipt {
        let start = Instant::now();
        let domain = match require(parameters, "domain") {
            Ok(d) => d,
            Err(e) => return ActionReceipt::failed(serde_json::json!({"error": e}), false, start),
        };
        let reason = parameters.get("reason").cloned().unwrap_or_default();

        if dry_run {
            return ActionReceipt::dry_run(self.kind(), parameters);
        }

        let result = self
            .client
            .post(format!("{}/block", self.sink_url))
            .header("X-API-Key", &self.api_key)
            .json(&serde_json::json!({"domain": domain, "reason": reason}))
            .send()
            .await;

        match result {
            Err(e) => ActionReceipt::failed(
                serde_json::json!({"domain": domain, "error": e.to_string()}),
                true,
                start,
            ),
            Ok(resp) if resp.status().is_success() => {
                ActionReceipt::ok(serde_json::json!({"domain": domain, "blocked": true}), start)
            }
            Ok(resp) => ActionReceipt::ok(
                serde_json::json!({
                    "domain": domain,
                    "blocked": true,
                    "note": format!("sink returned {}, treated as already-handled", resp.status()),
                }),
                start,
            ),
        }
    }
}

/// Tags a device in the Device Store (spec §4.B `add_tag`). Idempotent.
pub struct TagDeviceExecutor {
    devices: Arc<DeviceStore>,
}

impl TagDeviceExecutor {
    pub fn new(devices: Arc<DeviceStore>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl ActionExecutor for TagDeviceExecutor {
    fn kind(&self) -> &str {
        "tag-device"
    }

    fn validate(&self, parameters: &HashMap<String, String>) -> Result<(), String> {
        require(parameters, "device_id")?;
        require(parameters, "tag").map(|_| ())
    }

    async fn execute(&self, parameters: &HashMap<String, String>, dry_run: bool) -> ActionReceipt {
        let start = Instant::now();
        let (device_id, tag) = match (require(parameters, "device_id"), require(parameters, "tag")) {
            (Ok(d), Ok(t)) => (d.to_string(), t.to_string()),
            (Err(e), _) | (_, Err(e)) => {
                return ActionReceipt::failed(serde_json::json!({"error": e}), false, start)
            }
        };

        if dry_run {
            return ActionReceipt::dry_run(self.kind(), parameters);
        }

        match self.devices.add_tag(&device_id, &tag) {
            Ok(device) => ActionReceipt::ok(
                serde_json::json!({"device_id": device.identifier, "tags": device.tags}),
                start,
            ),
            Err(e) => ActionReceipt::failed(
                serde_json::json!({"device_id": device_id, "error": e.to_string()}),
                false,
                start,
            ),
        }
    }
}

/// Fans a notification out across configured transports (spec §4.I).
pub struct SendNotificationExecutor {
    transports: Vec<Arc<dyn crate::notify::NotificationTransport>>,
}

impl SendNotificationExecutor {
    pub fn new(transports: Vec<Arc<dyn crate::notify::NotificationTransport>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl ActionExecutor for SendNotificationExecutor {
    fn kind(&self) -> &str {
        "send-notification"
    }

    fn validate(&self, parameters: &HashMap<String, String>) -> Result<(), String> {
        require(parameters, "subject")?;
        require(parameters, "body").map(|_| ())
    }

    async fn execute(&self, parameters: &HashMap<String, String>, dry_run: bool) -> ActionReceipt {
        let start = Instant::now();
        let subject = parameters.get("subject").cloned().unwrap_or_default();
        let body = parameters.get("body").cloned().unwrap_or_default();

        if dry_run {
            return ActionReceipt::dry_run(self.kind(), parameters);
        }

        if self.transports.is_empty() {
            return ActionReceipt::failed(
                serde_json::json!({"error": "no notification transports configured"}),
                false,
                start,
            );
        }

        let outcomes = futures::future::join_all(
            self.transports
                .iter()
                .map(|transport| transport.send(&subject, &body)),
        )
        .await;

        let succeeded: Vec<&str> = self
            .transports
            .iter()
            .zip(outcomes.iter())
            .filter(|(_, ok)| **ok)
            .map(|(t, _)| t.name())
            .collect();

        if succeeded.is_empty() {
            ActionReceipt::failed(
                serde_json::json!({"subject": subject, "transports_attempted": self.transports.len()}),
                true,
                start,
            )
        } else {
            ActionReceipt::ok(serde_json::json!({"subject": subject, "succeeded_via": succeeded}), start)
        }
    }
}

/// Always succeeds; used for testing playbook wiring without side
/// effects or as an explicit no-op action.
pub struct SimulateOnlyExecutor;

#[async_trait]
impl ActionExecutor for SimulateOnlyExecutor {
    fn kind(&self) -> &str {
        "simulate-only"
    }

    fn validate(&self, _parameters: &HashMap<String, String>) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, parameters: &HashMap<String, String>, _dry_run: bool) -> ActionReceipt {
        ActionReceipt::ok(serde_json::json!({"action": "simulate-only", "parameters": parameters}), Instant::now())
    }
}
