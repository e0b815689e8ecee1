//! Scorer ports (spec §4.F): narrow capability traits over extracted
//! features, each swappable behind a dispatch table. Default
//! implementations are deterministic heuristics so the system is
//! testable without model binaries.

use crate::features::{DeviceFeatures, DomainFeatures};
use serde_json::Value;
use std::collections::HashMap;

/// Common output shape for both scorer ports.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub score: f64,
    pub reasons: Vec<String>,
    pub evidence: HashMap<String, Value>,
}

impl ScoreResult {
    fn new() -> Self {
        Self {
            score: 0.0,
            reasons: Vec::new(),
            evidence: HashMap::new(),
        }
    }

    fn add(&mut self, penalty: f64, reason: impl Into<String>) {
        self.score = (self.score + penalty).min(1.0);
        self.reasons.push(reason.into());
    }

    fn evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

/// Per-device anomaly scorer (spec §4.F).
pub trait DeviceAnomalyScorer: Send + Sync {
    fn score(&self, features: &DeviceFeatures) -> ScoreResult;
}

/// Per-domain risk scorer (spec §4.F).
pub trait DomainRiskScorer: Send + Sync {
    fn score(&self, domain: &str, features: &DomainFeatures) -> ScoreResult;
}

/// Thresholds for the default heuristic device scorer.
#[derive(Debug, Clone)]
pub struct DeviceHeuristicThresholds {
    pub high_connection_count: u64,
    pub high_unique_dest_ips: usize,
    pub high_unique_ports: usize,
    pub high_dns_query_count: u64,
}

impl Default for DeviceHeuristicThresholds {
    fn default() -> Self {
        Self {
            high_connection_count: 500,
            high_unique_dest_ips: 50,
            high_unique_ports: 30,
            high_dns_query_count: 200,
        }
    }
}

pub struct HeuristicDeviceScorer {
    thresholds: DeviceHeuristicThresholds,
}

impl HeuristicDeviceScorer {
    pub fn new(thresholds: DeviceHeuristicThresholds) -> Self {
        Self { thresholds }
    }
}

impl Default for HeuristicDeviceScorer {
    fn default() -> Self {
        Self::new(DeviceHeuristicThresholds::default())
    }
}

impl DeviceAnomalyScorer for HeuristicDeviceScorer {
    fn score(&self, features: &DeviceFeatures) -> ScoreResult {
        let mut result = ScoreResult::new()
            .evidence("connection_count", features.connection_count)
            .evidence("unique_dest_ips", features.unique_dest_ips as u64)
            .evidence("unique_ports", features.unique_ports as u64)
            .evidence("dns_query_count", features.dns_query_count);

        if features.connection_count > self.thresholds.high_connection_count {
            result.add(0.3, format!("unusually high connection count ({})", features.connection_count));
        }
        if features.unique_dest_ips > self.thresholds.high_unique_dest_ips {
            result.add(0.3, format!("scans {} distinct destinations", features.unique_dest_ips));
        }
        if features.unique_ports > self.thresholds.high_unique_ports {
            result.add(0.25, format!("probes {} distinct ports", features.unique_ports));
        }
        if features.dns_query_count > self.thresholds.high_dns_query_count {
            result.add(0.2, format!("unusually high DNS query volume ({})", features.dns_query_count));
        }
        if features.protocol_counts.len() > 5 {
            result.add(0.1, "unusually diverse protocol mix");
        }
        result
    }
}

/// Thresholds for the default heuristic domain scorer.
#[derive(Debug, Clone)]
pub struct DomainHeuristicThresholds {
    pub long_domain_length: usize,
    pub high_entropy: f64,
    pub high_digit_ratio: f64,
    pub suspicious_tlds: Vec<String>,
}

impl Default for DomainHeuristicThresholds {
    fn default() -> Self {
        Self {
            long_domain_length: 30,
            high_entropy: 3.3,
            high_digit_ratio: 0.3,
            suspicious_tlds: vec!["xyz".into(), "top".into(), "club".into(), "gq".into(), "tk".into()],
        }
    }
}

pub struct HeuristicDomainScorer {
    thresholds: DomainHeuristicThresholds,
}

impl HeuristicDomainScorer {
    pub fn new(thresholds: DomainHeuristicThresholds) -> Self {
        Self { thresholds }
    }
}

impl Default for HeuristicDomainScorer {
    fn default() -> Self {
        Self::new(DomainHeuristicThresholds::default())
    }
}

impl DomainRiskScorer for HeuristicDomainScorer {
    fn score(&self, _domain: &str, features: &DomainFeatures) -> ScoreResult {
        let mut result = ScoreResult::new()
            .evidence("length", features.length as u64)
            .evidence("label_count", features.label_count as u64)
            .evidence("entropy", features.entropy)
            .evidence("tld", features.tld.clone());

        if features.length > self.thresholds.long_domain_length {
            result.add(0.2, format!("unusually long domain name ({} chars)", features.length));
        }
        if features.entropy > self.thresholds.high_entropy {
            result.add(0.35, format!("high character entropy ({:.2})", features.entropy));
        }
        if features.digit_ratio > self.thresholds.high_digit_ratio {
            result.add(0.2, format!("high digit ratio ({:.2})", features.digit_ratio));
        }
        if self.thresholds.suspicious_tlds.contains(&features.tld) {
            result.add(0.15, format!("uncommon/abused TLD .{}", features.tld));
        }
        if features.label_count > 4 {
            result.add(0.1, format!("unusually deep subdomain structure ({} labels)", features.label_count));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{extract_device_features, extract_domain_features};
    use serde_json::json;

    #[test]
    fn quiet_device_scores_zero() {
        let features = extract_device_features(&[json!({"dest_ip": "1.1.1.1", "proto": "TCP"})]);
        let result = HeuristicDeviceScorer::default().score(&features);
        assert_eq!(result.score, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn port_scanning_device_is_flagged() {
        let records: Vec<Value> = (0..60)
            .map(|port| json!({"dest_ip": "1.1.1.1", "dest_port": port, "proto": "TCP"}))
            .collect();
        let features = extract_device_features(&records);
        let result = HeuristicDeviceScorer::default().score(&features);
        assert!(result.score > 0.0);
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn benign_domain_scores_low() {
        let features = extract_domain_features("example.com");
        let result = HeuristicDomainScorer::default().score("example.com", &features);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn dga_like_domain_scores_high() {
        let features = extract_domain_features("xk9q7z3mdpalq2.top");
        let result = HeuristicDomainScorer::default().score("xk9q7z3mdpalq2.top", &features);
        assert!(result.score > 0.3);
    }

    #[test]
    fn score_never_exceeds_one() {
        let domain = "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6q7r8s9.xyz";
        let features = extract_domain_features(domain);
        let result = HeuristicDomainScorer::default().score(domain, &features);
        assert!(result.score <= 1.0);
    }
}
