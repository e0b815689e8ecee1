//! Hostname-based type guessing (spec §4.B: "hostnames matching
//! well-known patterns set `guessed_type`").

use crate::device::DeviceType;

/// Known (substring, type) patterns, checked case-insensitively in
/// order; first match wins. Deliberately a flat table rather than a
/// classifier so the rule set stays auditable and testable.
const PATTERNS: &[(&str, DeviceType)] = &[
    ("iphone", DeviceType::Phone),
    ("android", DeviceType::Phone),
    ("pixel", DeviceType::Phone),
    ("galaxy-s", DeviceType::Phone),
    ("appletv", DeviceType::Tv),
    ("roku", DeviceType::Tv),
    ("chromecast", DeviceType::Tv),
    ("smart-tv", DeviceType::Tv),
    ("synology", DeviceType::Nas),
    ("qnap", DeviceType::Nas),
    ("nas", DeviceType::Nas),
    ("macbook", DeviceType::Laptop),
    ("thinkpad", DeviceType::Laptop),
    ("laptop", DeviceType::Laptop),
    ("imac", DeviceType::Desktop),
    ("desktop", DeviceType::Desktop),
    ("pc-", DeviceType::Desktop),
    ("printer", DeviceType::Printer),
    ("hp-laserjet", DeviceType::Printer),
    ("esp32", DeviceType::Iot),
    ("sonoff", DeviceType::Iot),
    ("smartplug", DeviceType::Iot),
    ("nest", DeviceType::Iot),
    ("ring-", DeviceType::Iot),
];

/// Guess a device type from its hostname. Returns `Unknown` when no
/// pattern matches.
pub fn guess_type(hostname: &str) -> DeviceType {
    let lower = hostname.to_lowercase();
    for (pattern, device_type) in PATTERNS {
        if lower.contains(pattern) {
            return *device_type;
        }
    }
    DeviceType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_phone_hostnames() {
        assert_eq!(guess_type("Johns-iPhone"), DeviceType::Phone);
    }

    #[test]
    fn recognizes_nas_hostnames() {
        assert_eq!(guess_type("synology-ds920"), DeviceType::Nas);
    }

    #[test]
    fn unrecognized_hostname_is_unknown() {
        assert_eq!(guess_type("mystery-box-17"), DeviceType::Unknown);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(guess_type("ROKU-ULTRA"), DeviceType::Tv);
    }
}
