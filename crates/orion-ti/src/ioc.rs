//! IOC model (spec §3). Threat category and feed source are closed
//! enums rather than open strings, per SPEC_FULL's data-model note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IocType {
    Domain,
    Ip,
    Url,
    Md5,
    Sha1,
    Sha256,
    Cve,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Otx,
    Urlhaus,
    Feodo,
    Phishtank,
    Manual,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSource::Otx => "otx",
            FeedSource::Urlhaus => "urlhaus",
            FeedSource::Feodo => "feodo",
            FeedSource::Phishtank => "phishtank",
            FeedSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    Malware,
    C2,
    Phishing,
    Botnet,
    Ransomware,
    Other,
}

/// A single indicator of compromise (spec §3). `(value, type, source)`
/// uniquely identifies a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ioc {
    pub value: String,
    pub ioc_type: IocType,
    pub source: FeedSource,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub confidence: f64,
    pub category: ThreatCategory,
    pub tags: Vec<String>,
    pub malware_family: Option<String>,
    pub description: Option<String>,
}

impl Ioc {
    pub fn new(
        value: impl Into<String>,
        ioc_type: IocType,
        source: FeedSource,
        confidence: f64,
        category: ThreatCategory,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value: value.into(),
            ioc_type,
            source,
            first_seen: seen_at,
            last_seen: seen_at,
            confidence: confidence.clamp(0.0, 1.0),
            category,
            tags: Vec::new(),
            malware_family: None,
            description: None,
        }
    }
}

/// Normalize a raw indicator value for the given type (spec §4.C):
/// domains lowercased, URLs keep path/query but lowercase scheme+host,
/// IPs canonicalized, hashes lowercased hex.
pub fn normalize_value(raw: &str, ioc_type: IocType) -> String {
    match ioc_type {
        IocType::Domain => raw.trim().trim_end_matches('.').to_lowercase(),
        IocType::Md5 | IocType::Sha1 | IocType::Sha256 => raw.trim().to_lowercase(),
        IocType::Ip => raw
            .trim()
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| raw.trim().to_string()),
        IocType::Url => normalize_url(raw.trim()),
        IocType::Cve => raw.trim().to_uppercase(),
    }
}

fn normalize_url(raw: &str) -> String {
    if let Some(scheme_end) = raw.find("://") {
        let (scheme, rest) = raw.split_at(scheme_end);
        let rest = &rest[3..];
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let lowered_scheme = scheme.to_lowercase();
        let lowered_host = host.to_lowercase();
        if path.is_empty() {
            format!("{lowered_scheme}://{lowered_host}")
        } else {
            format!("{lowered_scheme}://{lowered_host}/{path}")
        }
    } else {
        raw.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_normalized_lowercase_no_trailing_dot() {
        assert_eq!(normalize_value("Evil.Example.COM.", IocType::Domain), "evil.example.com");
    }

    #[test]
    fn hash_normalized_lowercase() {
        assert_eq!(normalize_value("ABCDEF", IocType::Sha256), "abcdef");
    }

    #[test]
    fn ipv6_canonicalized_to_compressed_form() {
        assert_eq!(
            normalize_value("2001:0db8:0000:0000:0000:0000:0000:0001", IocType::Ip),
            "2001:db8::1"
        );
    }

    #[test]
    fn url_lowercases_scheme_and_host_only() {
        assert_eq!(
            normalize_value("HTTP://Evil.Example.COM/Path?Q=1", IocType::Url),
            "http://evil.example.com/Path?Q=1"
        );
    }

    #[test]
    fn confidence_clamped_to_unit_interval() {
        let ioc = Ioc::new("x", IocType::Domain, FeedSource::Manual, 1.5, ThreatCategory::Other, Utc::now());
        assert_eq!(ioc.confidence, 1.0);
    }
}
