//! Feature extraction from raw records (spec §4.F): the only thing
//! this component specifies about its input is which features a
//! scorer can expect to see.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Per-device features aggregated over a window of records.
#[derive(Debug, Clone, Default)]
pub struct DeviceFeatures {
    pub connection_count: u64,
    pub bytes_to_server: u64,
    pub bytes_to_client: u64,
    pub unique_dest_ips: usize,
    pub unique_ports: usize,
    pub dns_query_count: u64,
    pub unique_domains: usize,
    pub protocol_counts: HashMap<String, u64>,
}

pub fn extract_device_features(records: &[Value]) -> DeviceFeatures {
    let mut features = DeviceFeatures::default();
    let mut dest_ips = HashSet::new();
    let mut ports = HashSet::new();
    let mut domains = HashSet::new();

    for record in records {
        if record.get("flow").is_some() {
            features.connection_count += 1;
            if let Some(b) = record.get("flow").and_then(|f| f.get("bytes_toserver")).and_then(Value::as_u64) {
                features.bytes_to_server += b;
            }
            if let Some(b) = record.get("flow").and_then(|f| f.get("bytes_toclient")).and_then(Value::as_u64) {
                features.bytes_to_client += b;
            }
        }
        if let Some(ip) = record.get("dest_ip").and_then(Value::as_str) {
            dest_ips.insert(ip.to_string());
        }
        if let Some(port) = record.get("dest_port").and_then(Value::as_u64) {
            ports.insert(port);
        }
        if let Some(rrname) = record.get("dns").and_then(|d| d.get("rrname")).and_then(Value::as_str) {
            features.dns_query_count += 1;
            domains.insert(rrname.to_string());
        }
        if let Some(proto) = record.get("proto").and_then(Value::as_str) {
            *features.protocol_counts.entry(proto.to_string()).or_insert(0) += 1;
        }
    }

    features.unique_dest_ips = dest_ips.len();
    features.unique_ports = ports.len();
    features.unique_domains = domains.len();
    features
}

/// Lexical features of a domain name, used for DGA-style risk scoring.
#[derive(Debug, Clone)]
pub struct DomainFeatures {
    pub length: usize,
    pub label_count: usize,
    pub entropy: f64,
    pub tld: String,
    pub digit_ratio: f64,
}

pub fn extract_domain_features(domain: &str) -> DomainFeatures {
    let domain = domain.trim_end_matches('.');
    let labels: Vec<&str> = domain.split('.').collect();
    let tld = labels.last().map(|s| s.to_lowercase()).unwrap_or_default();
    let digits = domain.chars().filter(|c| c.is_ascii_digit()).count();
    let digit_ratio = if domain.is_empty() { 0.0 } else { digits as f64 / domain.len() as f64 };

    DomainFeatures {
        length: domain.len(),
        label_count: labels.len(),
        entropy: shannon_entropy(domain),
        tld,
        digit_ratio,
    }
}

fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, u32> = HashMap::new();
    for ch in s.chars() {
        *counts.entry(ch).or_insert(0) += 1;
    }
    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_features_aggregate_flows_and_dns() {
        let records = vec![
            json!({"dest_ip": "1.1.1.1", "dest_port": 443, "proto": "TCP", "flow": {"bytes_toserver": 100, "bytes_toclient": 200}}),
            json!({"dest_ip": "8.8.8.8", "dest_port": 53, "proto": "UDP", "dns": {"rrname": "example.com"}}),
        ];
        let features = extract_device_features(&records);
        assert_eq!(features.connection_count, 1);
        assert_eq!(features.unique_dest_ips, 2);
        assert_eq!(features.unique_ports, 2);
        assert_eq!(features.dns_query_count, 1);
        assert_eq!(features.bytes_to_server, 100);
    }

    #[test]
    fn repetitive_domain_has_lower_entropy_than_random_one() {
        let repetitive = extract_domain_features("aaaaaaaa.com");
        let random_looking = extract_domain_features("x7qz9kd3.com");
        assert!(repetitive.entropy < random_looking.entropy);
        assert!(repetitive.entropy < 2.0);
        assert!(random_looking.entropy > 2.5);
    }

    #[test]
    fn digit_ratio_computed_over_whole_domain() {
        let f = extract_domain_features("a1b2c3.com");
        assert!(f.digit_ratio > 0.0);
    }
}
