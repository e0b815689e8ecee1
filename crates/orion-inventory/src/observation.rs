//! Raw-record -> observation extraction (spec §4.E step 2, §6 inbound
//! fields).

use chrono::{DateTime, Utc};
use orion_common::OrionError;
use serde_json::Value;

/// A single `(ip, mac?, hostname?, timestamp)` observation extracted
/// from one EVE-JSON-shaped log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub ip: String,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Parse one raw log line into an observation. Only `src_ip` is
/// required (spec §6); `src_mac`/`hostname` are opportunistic extras
/// some EVE producers include. Unknown fields are ignored, not an
/// error (spec §6 "unknown fields are preserved but unused").
pub fn extract_observation(line: &str) -> Result<Observation, OrionError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| OrionError::Invalid(format!("unparseable record: {e}")))?;

    let ip = value
        .get("src_ip")
        .and_then(Value::as_str)
        .ok_or_else(|| OrionError::Invalid("record missing src_ip".to_string()))?
        .to_string();

    let mac = value
        .get("src_mac")
        .or_else(|| value.get("mac"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let hostname = value
        .get("hostname")
        .or_else(|| value.get("http").and_then(|h| h.get("hostname")))
        .and_then(Value::as_str)
        .map(str::to_string);

    let timestamp = value
        .get("timestamp")
        .or_else(|| value.get("ts"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| OrionError::Invalid("record missing parseable timestamp".to_string()))?;

    Ok(Observation {
        ip,
        mac,
        hostname,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_flow_record() {
        let line = r#"{"src_ip":"192.168.1.50","dest_ip":"1.1.1.1","flow":{"bytes_toserver":120},"ts":"2024-01-15T10:00:00Z"}"#;
        let obs = extract_observation(line).unwrap();
        assert_eq!(obs.ip, "192.168.1.50");
        assert!(obs.mac.is_none());
    }

    #[test]
    fn extracts_dns_record_with_timestamp_field() {
        let line = r#"{"src_ip":"192.168.1.50","dns":{"rrname":"evil.example.com","rrtype":"A"},"timestamp":"2024-01-15T10:05:00Z"}"#;
        let obs = extract_observation(line).unwrap();
        assert_eq!(obs.ip, "192.168.1.50");
    }

    #[test]
    fn rejects_record_without_src_ip() {
        let line = r#"{"dest_ip":"1.1.1.1","ts":"2024-01-15T10:00:00Z"}"#;
        assert!(extract_observation(line).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(extract_observation("not json").is_err());
    }
}
