//! Device Store and Inventory Collector (spec components 4.B, 4.E).
//!
//! Discovers hosts from flow/DNS traffic, maintains a durable
//! MAC-or-IP-keyed inventory, and guesses device types from hostnames.

pub mod collector;
pub mod device;
pub mod fingerprint;
pub mod observation;
pub mod store;

pub use collector::{CollectorConfig, InventoryCollector, TickStats};
pub use device::{Device, DeviceType};
pub use observation::{extract_observation, Observation};
pub use store::{DeviceFilter, DeviceStore};
