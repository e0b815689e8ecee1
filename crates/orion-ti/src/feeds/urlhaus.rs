//! abuse.ch URLhaus CSV export parser
//! (`#id,dateadded,url,url_status,threat,tags,...`).

use super::FeedParser;
use crate::ioc::{FeedSource, Ioc, IocType, ThreatCategory};
use chrono::{DateTime, Utc};
use orion_common::OrionError;

fn category_for(threat: &str) -> ThreatCategory {
    match threat {
        t if t.contains("botnet") => ThreatCategory::Botnet,
        t if t.contains("phish") => ThreatCategory::Phishing,
        t if t.contains("ransom") => ThreatCategory::Ransomware,
        t if t.contains("c2") || t.contains("cobalt") => ThreatCategory::C2,
        _ => ThreatCategory::Malware,
    }
}

/// Split one CSV line respecting double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

pub struct UrlhausParser;

impl FeedParser for UrlhausParser {
    fn source_name(&self) -> &'static str {
        "urlhaus"
    }

    fn parse(&self, raw: &str) -> Result<Vec<Ioc>, OrionError> {
        let mut iocs = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields = split_csv_line(line);
            if fields.len() < 5 {
                continue;
            }
            let date_added = fields[1].trim_matches('"');
            let url = fields[2].trim_matches('"');
            let threat = fields[4].trim_matches('"');
            if url.is_empty() {
                continue;
            }
            let seen_at = DateTime::parse_from_str(date_added, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            iocs.push(Ioc::new(url, IocType::Url, FeedSource::Urlhaus, 0.8, category_for(threat), seen_at));
        }
        Ok(iocs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_rows_and_skips_comments() {
        let raw = "# Generated export\n\
                    #id,dateadded,url,url_status,threat,tags\n\
                    1,\"2024-01-15 10:00:00\",\"http://evil.example.com/x\",\"online\",\"malware_download\",\"exe\"\n";
        let iocs = UrlhausParser.parse(raw).unwrap();
        assert_eq!(iocs.len(), 1);
        assert_eq!(iocs[0].value, "http://evil.example.com/x");
        assert_eq!(iocs[0].category, ThreatCategory::Malware);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let raw = "\n\n#id,dateadded,url,url_status,threat,tags\n";
        assert!(UrlhausParser.parse(raw).unwrap().is_empty());
    }
}
