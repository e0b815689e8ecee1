//! `Device` model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guessed device category, derived by hostname fingerprinting unless
/// an operator has set it explicitly (spec §4.B).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Phone,
    Tv,
    Nas,
    Laptop,
    Desktop,
    Iot,
    Printer,
    Unknown,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Unknown
    }
}

/// A discovered host. `identifier` is immutable for the life of the
/// device (spec §3 invariant): derived from MAC if known, else IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub identifier: String,
    pub current_ip: String,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub tags: Vec<String>,
    pub guessed_type: DeviceType,
    /// Set explicitly by an operator; once set, fingerprinting never
    /// overrides it (spec §4.B).
    pub type_operator_set: bool,
    pub owner: Option<String>,
    pub risk_score: Option<f64>,
}

impl Device {
    pub fn new(identifier: String, ip: String, mac: Option<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            identifier,
            current_ip: ip,
            mac,
            hostname: None,
            first_seen: seen_at,
            last_seen: seen_at,
            tags: Vec::new(),
            guessed_type: DeviceType::Unknown,
            type_operator_set: false,
            owner: None,
            risk_score: None,
        }
    }

    /// Insert a tag, respecting set semantics (spec §3: "no
    /// duplicates").
    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// Whether this device counts as "unknown/untagged" for the
    /// health score (spec §4.K).
    pub fn is_unknown_untagged(&self) -> bool {
        self.tags.is_empty() && self.guessed_type == DeviceType::Unknown
    }

    /// Whether this device has no tags at all, independent of whether
    /// its type has been identified (spec §4.K "untagged" metric,
    /// gathered separately from "unknown").
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }
}
