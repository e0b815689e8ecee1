//! AlienVault OTX `pulses` JSON export parser.

use super::FeedParser;
use crate::ioc::{FeedSource, Ioc, IocType, ThreatCategory};
use chrono::Utc;
use orion_common::OrionError;
use serde::Deserialize;

#[derive(Deserialize)]
struct PulseExport {
    #[serde(default)]
    results: Vec<Pulse>,
}

#[derive(Deserialize)]
struct Pulse {
    #[serde(default)]
    indicators: Vec<Indicator>,
}

#[derive(Deserialize)]
struct Indicator {
    indicator: String,
    indicator_type: String,
}

fn map_type(raw: &str) -> Option<IocType> {
    match raw.to_ascii_uppercase().as_str() {
        "DOMAIN" | "HOSTNAME" => Some(IocType::Domain),
        "IPV4" | "IPV6" => Some(IocType::Ip),
        "URL" => Some(IocType::Url),
        "FILEHASH-MD5" => Some(IocType::Md5),
        "FILEHASH-SHA1" => Some(IocType::Sha1),
        "FILEHASH-SHA256" => Some(IocType::Sha256),
        "CVE" => Some(IocType::Cve),
        _ => None,
    }
}

pub struct OtxParser;

impl FeedParser for OtxParser {
    fn source_name(&self) -> &'static str {
        "otx"
    }

    fn parse(&self, raw: &str) -> Result<Vec<Ioc>, OrionError> {
        let export: PulseExport =
            serde_json::from_str(raw).map_err(|e| OrionError::Invalid(format!("otx feed: {e}")))?;
        let now = Utc::now();
        let iocs = export
            .results
            .into_iter()
            .flat_map(|pulse| pulse.indicators)
            .filter_map(|ind| {
                let ioc_type = map_type(&ind.indicator_type)?;
                Some(Ioc::new(ind.indicator, ioc_type, FeedSource::Otx, 0.75, ThreatCategory::Other, now))
            })
            .collect();
        Ok(iocs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_indicator_types() {
        let raw = r#"{"results":[{"indicators":[
            {"indicator":"evil.example.com","indicator_type":"domain"},
            {"indicator":"1.2.3.4","indicator_type":"IPv4"},
            {"indicator":"unknown-thing","indicator_type":"Weird"}
        ]}]}"#;
        let iocs = OtxParser.parse(raw).unwrap();
        assert_eq!(iocs.len(), 2);
        assert_eq!(iocs[0].value, "evil.example.com");
        assert_eq!(iocs[0].ioc_type, IocType::Domain);
    }

    #[test]
    fn malformed_json_is_invalid_not_panic() {
        assert!(OtxParser.parse("not json").is_err());
    }
}
