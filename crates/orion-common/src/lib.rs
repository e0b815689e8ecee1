//! Shared types, errors, and helpers for Orion Sentinel NetSec.
//!
//! This crate has no dependency on any other core component; it sits at
//! the bottom of the leaf-first dependency graph described in spec §2.

pub mod error;
pub mod events;
pub mod json_path;
pub mod time;

pub use error::{OrionError, OrionResult};
pub use events::{event_types, SecurityEvent, SecurityEventBuilder, Severity};
