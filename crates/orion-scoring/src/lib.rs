//! Feature extraction and scorer ports (spec component 4.F).

pub mod features;
pub mod scorer;

pub use features::{extract_device_features, extract_domain_features, DeviceFeatures, DomainFeatures};
pub use scorer::{
    DeviceAnomalyScorer, DeviceHeuristicThresholds, DomainHeuristicThresholds, DomainRiskScorer,
    HeuristicDeviceScorer, HeuristicDomainScorer, ScoreResult,
};
