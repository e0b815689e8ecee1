//! Canonical `SecurityEvent` model (spec §3, component 4.D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Severity, ordered so that `>=` comparisons work as the spec expects
/// (e.g. "severity >= high").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    /// Severity derived from a TI confidence score (spec §4.G).
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Severity::High
        } else if confidence >= 0.7 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unified security event. Immutable once emitted (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(default = "default_event_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub dest_ip: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub ti_sources: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Well-known event-type constants (spec §3 examples). Event types remain
/// plain strings on the wire (low-cardinality, open set per §3), but
/// emitters should use these constants rather than retyping literals.
pub mod event_types {
    pub const INTEL_MATCH: &str = "intel_match";
    pub const DEVICE_ANOMALY: &str = "device_anomaly";
    pub const DOMAIN_RISK: &str = "domain_risk";
    pub const NEW_DEVICE: &str = "new_device";
    pub const SOAR_ACTION: &str = "soar_action";
    pub const SECURITY_HEALTH_UPDATE: &str = "security_health_update";
    pub const SURICATA_ALERT: &str = "suricata_alert";
    pub const HEALTH_STATUS: &str = "health_status";
}

/// Builder for constructing events with sensible defaults; timestamp is
/// filled at build time unless explicitly set (spec §3 invariant).
pub struct SecurityEventBuilder {
    event: SecurityEvent,
}

impl SecurityEvent {
    pub fn builder(event_type: impl Into<String>, severity: Severity) -> SecurityEventBuilder {
        SecurityEventBuilder {
            event: SecurityEvent {
                id: default_event_id(),
                timestamp: Utc::now(),
                event_type: event_type.into(),
                severity,
                title: String::new(),
                description: String::new(),
                source_ip: None,
                dest_ip: None,
                device_id: None,
                domain: None,
                risk_score: None,
                reasons: Vec::new(),
                ti_sources: Vec::new(),
                metadata: HashMap::new(),
            },
        }
    }

    /// Renders this event as a Common Event Format line. Additive
    /// convenience for display-layer forwarding; the canonical wire
    /// format remains the JSON line produced by the emitter (§4.D).
    pub fn to_cef(&self) -> String {
        format!(
            "CEF:0|OrionSentinel|netsec-core|1.0|{}|{}|{}|rt={} msg={}",
            self.event_type,
            self.title,
            match self.severity {
                Severity::Info => 0,
                Severity::Low => 3,
                Severity::Medium => 5,
                Severity::High => 8,
                Severity::Critical => 10,
            },
            self.timestamp.timestamp_millis(),
            self.description.replace('|', "\\|"),
        )
    }
}

impl SecurityEventBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.event.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.event.description = description.into();
        self
    }

    pub fn source_ip(mut self, ip: impl Into<String>) -> Self {
        self.event.source_ip = Some(ip.into());
        self
    }

    pub fn dest_ip(mut self, ip: impl Into<String>) -> Self {
        self.event.dest_ip = Some(ip.into());
        self
    }

    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.event.device_id = Some(id.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.event.domain = Some(domain.into());
        self
    }

    pub fn risk_score(mut self, score: f64) -> Self {
        self.event.risk_score = Some(score);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.event.reasons.push(reason.into());
        self
    }

    pub fn reasons(mut self, reasons: Vec<String>) -> Self {
        self.event.reasons = reasons;
        self
    }

    pub fn ti_source(mut self, source: impl Into<String>) -> Self {
        self.event.ti_sources.push(source.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.event.metadata.insert(key.into(), value);
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.event.timestamp = ts;
        self
    }

    pub fn build(self) -> SecurityEvent {
        self.event
    }
}

/// Stream labels derived from an event for the log-store push (§4.D).
pub fn labels_for(event: &SecurityEvent, app: &str, component: Option<&str>) -> Vec<(String, String)> {
    let mut labels = vec![
        ("app".to_string(), app.to_string()),
        ("event_type".to_string(), event.event_type.clone()),
        ("severity".to_string(), event.severity.as_str().to_string()),
    ];
    if let Some(component) = component {
        labels.push(("component".to_string(), component.to_string()));
    }
    if let Some(device_id) = &event.device_id {
        labels.push(("device_id".to_string(), device_id.clone()));
    }
    labels
}
