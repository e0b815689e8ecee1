//! abuse.ch Feodo Tracker CSV parser
//! (`first_seen,dst_ip,dst_port,last_online,malware`).

use super::FeedParser;
use crate::ioc::{FeedSource, Ioc, IocType, ThreatCategory};
use chrono::{DateTime, Utc};
use orion_common::OrionError;

pub struct FeodoParser;

impl FeedParser for FeodoParser {
    fn source_name(&self) -> &'static str {
        "feodo"
    }

    fn parse(&self, raw: &str) -> Result<Vec<Ioc>, OrionError> {
        let mut iocs = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("first_seen") {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 5 {
                continue;
            }
            let (first_seen, dst_ip, _dst_port, last_online, malware) =
                (fields[0], fields[1], fields[2], fields[3], fields[4]);
            if dst_ip.is_empty() {
                continue;
            }
            let first_seen = DateTime::parse_from_str(first_seen, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let last_seen = DateTime::parse_from_str(last_online, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(first_seen);
            let mut ioc = Ioc::new(dst_ip, IocType::Ip, FeedSource::Feodo, 0.85, ThreatCategory::C2, first_seen);
            ioc.last_seen = last_seen.max(first_seen);
            ioc.malware_family = if malware.is_empty() { None } else { Some(malware.to_string()) };
            iocs.push(ioc);
        }
        Ok(iocs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_c2_rows() {
        let raw = "first_seen,dst_ip,dst_port,last_online,malware\n\
                    2024-01-10 08:00:00,203.0.113.9,443,2024-01-15 09:00:00,Dridex\n";
        let iocs = FeodoParser.parse(raw).unwrap();
        assert_eq!(iocs.len(), 1);
        assert_eq!(iocs[0].value, "203.0.113.9");
        assert_eq!(iocs[0].malware_family.as_deref(), Some("Dridex"));
        assert_eq!(iocs[0].category, ThreatCategory::C2);
    }
}
