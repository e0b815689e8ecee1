//! Device Store (spec §4.B): durable keyed store with a secondary
//! index by current IP, serialized per identifier for writes.

use crate::device::{Device, DeviceType};
use crate::fingerprint;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orion_common::OrionError;
use std::path::Path;

/// Filter for `list`. All fields are ANDed; `None` means "don't
/// filter on this".
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub guessed_type: Option<DeviceType>,
    pub tag: Option<String>,
    pub unknown_untagged_only: bool,
    pub untagged_only: bool,
}

/// Durable keyed store of devices (spec §4.B). `DashMap` gives
/// per-shard locking, which is what provides the "serialized per
/// identifier" write guarantee in practice; reads never block a
/// writer on a different key.
pub struct DeviceStore {
    devices: DashMap<String, Device>,
    /// Secondary index: current IP -> identifier.
    by_ip: DashMap<String, String>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            by_ip: DashMap::new(),
        }
    }

    /// Derive the stable identifier for an observation: MAC if known,
    /// else IP (spec §3).
    fn identifier_for(mac: Option<&str>, ip: &str) -> String {
        match mac {
            Some(mac) => format!("mac:{}", mac.to_lowercase()),
            None => format!("ip:{ip}"),
        }
    }

    /// Idempotent upsert (spec §4.B). Returns the updated device and
    /// whether it was newly created.
    pub fn upsert_from_observation(
        &self,
        ip: &str,
        mac: Option<&str>,
        hostname: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> (Device, bool) {
        // If a MAC is present and already known, update that record in
        // place (even if the IP changed). Otherwise fall back to the
        // IP-keyed record. Only if neither resolves do we insert new.
        let identifier = if let Some(mac) = mac {
            let mac_id = Self::identifier_for(Some(mac), ip);
            if self.devices.contains_key(&mac_id) {
                mac_id
            } else if let Some(existing) = self.by_ip.get(ip) {
                existing.clone()
            } else {
                mac_id
            }
        } else if let Some(existing) = self.by_ip.get(ip) {
            existing.clone()
        } else {
            Self::identifier_for(None, ip)
        };

        let mut created = false;
        let mut entry = self.devices.entry(identifier.clone()).or_insert_with(|| {
            created = true;
            Device::new(identifier.clone(), ip.to_string(), mac.map(str::to_string), seen_at)
        });

        // Advance last-seen monotonically; first-seen never regresses
        // (spec §3 invariant).
        entry.last_seen = entry.last_seen.max(seen_at);
        entry.first_seen = entry.first_seen.min(seen_at);

        if entry.current_ip != ip {
            self.by_ip.remove(&entry.current_ip);
            entry.current_ip = ip.to_string();
        }
        self.by_ip.insert(ip.to_string(), identifier.clone());

        if mac.is_some() && entry.mac.is_none() {
            entry.mac = mac.map(str::to_string);
        }
        if let Some(hostname) = hostname {
            entry.hostname = Some(hostname.to_string());
            if !entry.type_operator_set && entry.guessed_type == DeviceType::Unknown {
                entry.guessed_type = fingerprint::guess_type(hostname);
            }
        }

        (entry.clone(), created)
    }

    pub fn get(&self, identifier: &str) -> Option<Device> {
        self.devices.get(identifier).map(|d| d.clone())
    }

    pub fn list(&self, filter: &DeviceFilter) -> Vec<Device> {
        self.devices
            .iter()
            .map(|e| e.clone())
            .filter(|d| {
                filter
                    .guessed_type
                    .map(|t| d.guessed_type == t)
                    .unwrap_or(true)
            })
            .filter(|d| {
                filter
                    .tag
                    .as_ref()
                    .map(|t| d.tags.iter().any(|tag| tag == t))
                    .unwrap_or(true)
            })
            .filter(|d| !filter.unknown_untagged_only || d.is_unknown_untagged())
            .filter(|d| !filter.untagged_only || d.is_untagged())
            .collect()
    }

    pub fn add_tag(&self, identifier: &str, tag: &str) -> Result<Device, OrionError> {
        let mut entry = self
            .devices
            .get_mut(identifier)
            .ok_or_else(|| OrionError::Invalid(format!("unknown device {identifier}")))?;
        entry.add_tag(tag);
        Ok(entry.clone())
    }

    pub fn remove_tag(&self, identifier: &str, tag: &str) -> Result<Device, OrionError> {
        let mut entry = self
            .devices
            .get_mut(identifier)
            .ok_or_else(|| OrionError::Invalid(format!("unknown device {identifier}")))?;
        entry.remove_tag(tag);
        Ok(entry.clone())
    }

    pub fn set_type(&self, identifier: &str, device_type: DeviceType) -> Result<Device, OrionError> {
        let mut entry = self
            .devices
            .get_mut(identifier)
            .ok_or_else(|| OrionError::Invalid(format!("unknown device {identifier}")))?;
        entry.guessed_type = device_type;
        entry.type_operator_set = true;
        Ok(entry.clone())
    }

    pub fn set_owner(&self, identifier: &str, owner: impl Into<String>) -> Result<Device, OrionError> {
        let mut entry = self
            .devices
            .get_mut(identifier)
            .ok_or_else(|| OrionError::Invalid(format!("unknown device {identifier}")))?;
        entry.owner = Some(owner.into());
        Ok(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Write a JSON snapshot to `path` (durability per spec §6
    /// "Persisted state layout"). Called explicitly by the caller
    /// (e.g. on a persistence tick or at shutdown) rather than on
    /// every write, to avoid an IO op per observation.
    pub async fn persist(&self, path: &Path) -> Result<(), OrionError> {
        let snapshot: Vec<Device> = self.devices.iter().map(|e| e.clone()).collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Load a JSON snapshot written by [`Self::persist`]. Missing file
    /// is not an error (empty store).
    pub async fn load(path: &Path) -> Result<Self, OrionError> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Vec<Device> = serde_json::from_slice(&bytes)?;
        for device in snapshot {
            store.by_ip.insert(device.current_ip.clone(), device.identifier.clone());
            store.devices.insert(device.identifier.clone(), device);
        }
        Ok(store)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
