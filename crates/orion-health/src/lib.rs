//! Health-Score Service: composite network security posture scoring
//! (spec component 4.K).

pub mod metrics;
pub mod scoring;
pub mod service;

pub use metrics::{gather_metrics, HealthMetrics, HygieneFlags};
pub use scoring::{score, ComponentScore, Grade, HealthReport, ScoringThresholds, StepThresholds};
pub use service::{HealthService, HealthServiceConfig};
