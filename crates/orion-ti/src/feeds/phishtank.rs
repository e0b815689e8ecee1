//! PhishTank JSON export parser (`url`, `verified`, `online`).

use super::FeedParser;
use crate::ioc::{FeedSource, Ioc, IocType, ThreatCategory};
use chrono::Utc;
use orion_common::OrionError;
use serde::Deserialize;

#[derive(Deserialize)]
struct PhishtankEntry {
    url: String,
    #[serde(default)]
    verified: String,
    #[serde(default)]
    online: String,
}

fn is_truthy(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}

pub struct PhishtankParser;

impl FeedParser for PhishtankParser {
    fn source_name(&self) -> &'static str {
        "phishtank"
    }

    fn parse(&self, raw: &str) -> Result<Vec<Ioc>, OrionError> {
        let entries: Vec<PhishtankEntry> =
            serde_json::from_str(raw).map_err(|e| OrionError::Invalid(format!("phishtank feed: {e}")))?;
        let now = Utc::now();
        let iocs = entries
            .into_iter()
            .filter(|e| is_truthy(&e.online))
            .map(|e| {
                let confidence = if is_truthy(&e.verified) { 0.95 } else { 0.6 };
                Ioc::new(e.url, IocType::Url, FeedSource::Phishtank, confidence, ThreatCategory::Phishing, now)
            })
            .collect();
        Ok(iocs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_entries_are_dropped() {
        let raw = r#"[
            {"url":"http://phish1.example.com","verified":"yes","online":"yes"},
            {"url":"http://phish2.example.com","verified":"no","online":"no"}
        ]"#;
        let iocs = PhishtankParser.parse(raw).unwrap();
        assert_eq!(iocs.len(), 1);
        assert_eq!(iocs[0].confidence, 0.95);
    }
}
