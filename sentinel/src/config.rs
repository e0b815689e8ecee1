//! Sentinel configuration: a single flat mapping of environment-variable-style
//! keys (spec §6 "Configuration surface"), loaded from JSON or YAML with a
//! `Default::default()` fallback -- the same shape as the teacher's
//! `EdgeConfig::load`.

use orion_ti::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub log_store_url: String,
    pub dns_sink_url: String,
    pub dns_sink_api_key: String,

    pub device_store_path: PathBuf,
    pub ioc_store_path: PathBuf,
    pub high_water_mark_path: PathBuf,
    pub playbooks_path: Option<PathBuf>,
    pub hygiene_path: Option<PathBuf>,

    /// Master switch: when set, every triggered action runs as a
    /// dry-run regardless of its playbook's own `dry_run` field.
    pub global_dry_run: bool,

    pub inventory_interval_secs: u64,
    pub inventory_lookback_secs: i64,
    pub correlator_interval_secs: u64,
    pub correlator_lookback_secs: i64,
    pub suppression_window_secs: i64,
    pub feed_ingest_interval_secs: u64,
    pub ioc_retention_days: i64,
    pub soar_interval_secs: u64,
    pub health_interval_secs: u64,
    pub store_persist_interval_secs: u64,

    pub health_thresholds: orion_health::ScoringThresholds,

    pub feeds: FeedsConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    pub otx_enabled: bool,
    pub otx_url: String,
    pub urlhaus_enabled: bool,
    pub urlhaus_url: String,
    pub feodo_enabled: bool,
    pub feodo_url: String,
    pub phishtank_enabled: bool,
    pub phishtank_url: String,
}

impl FeedsConfig {
    pub fn to_feed_configs(&self) -> Vec<FeedConfig> {
        use orion_ti::FeedSource;
        vec![
            FeedConfig {
                source: FeedSource::Otx,
                url: self.otx_url.clone(),
                enabled: self.otx_enabled,
            },
            FeedConfig {
                source: FeedSource::Urlhaus,
                url: self.urlhaus_url.clone(),
                enabled: self.urlhaus_enabled,
            },
            FeedConfig {
                source: FeedSource::Feodo,
                url: self.feodo_url.clone(),
                enabled: self.feodo_enabled,
            },
            FeedConfig {
                source: FeedSource::Phishtank,
                url: self.phishtank_url.clone(),
                enabled: self.phishtank_enabled,
            },
        ]
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            otx_enabled: false,
            otx_url: "https://otx.alienvault.com/api/v1/pulses/subscribed".to_string(),
            urlhaus_enabled: false,
            urlhaus_url: "https://urlhaus.abuse.ch/downloads/json_recent/".to_string(),
            feodo_enabled: false,
            feodo_url: "https://feodotracker.abuse.ch/downloads/ipblocklist.json".to_string(),
            phishtank_enabled: false,
            phishtank_url: "http://data.phishtank.com/data/online-valid.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: Option<SmtpConfig>,
    pub chat_webhook_url: Option<String>,
    pub generic_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            log_store_url: "http://localhost:3100".to_string(),
            dns_sink_url: "http://localhost:8081".to_string(),
            dns_sink_api_key: String::new(),

            device_store_path: PathBuf::from("./data/devices.json"),
            ioc_store_path: PathBuf::from("./data/iocs.json"),
            high_water_mark_path: PathBuf::from("./data/soar_high_water_mark.txt"),
            playbooks_path: Some(PathBuf::from("./config/playbooks.yaml")),
            hygiene_path: Some(PathBuf::from("./config/hygiene.json")),

            global_dry_run: false,

            inventory_interval_secs: 600,
            inventory_lookback_secs: 600,
            correlator_interval_secs: 300,
            correlator_lookback_secs: 300,
            suppression_window_secs: 300,
            feed_ingest_interval_secs: 3600,
            ioc_retention_days: 90,
            soar_interval_secs: 60,
            health_interval_secs: 300,
            store_persist_interval_secs: 300,

            health_thresholds: orion_health::ScoringThresholds::default(),

            feeds: FeedsConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl SentinelConfig {
    /// Load from JSON or YAML, sniffed by file extension (spec §10
    /// "Ambient"). Falls back to `Default::default()` with a warning
    /// when the file can't be read, matching `EdgeConfig::load`'s
    /// fallback shape.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let parsed = if is_yaml_path(path) {
                    serde_yaml::from_str(&content).map_err(|e| e.to_string())
                } else {
                    serde_json::from_str(&content).map_err(|e| e.to_string())
                };
                match parsed {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file not found, using defaults");
                Self::default()
            }
        }
        .with_env_overrides()
    }

    /// Override specific keys from `ORION_<KEY>` environment variables
    /// (spec §10 "overridable by environment variables").
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ORION_LOG_STORE_URL") {
            self.log_store_url = url;
        }
        if let Ok(url) = std::env::var("ORION_DNS_SINK_URL") {
            self.dns_sink_url = url;
        }
        if let Ok(key) = std::env::var("ORION_DNS_SINK_API_KEY") {
            self.dns_sink_api_key = key;
        }
        if let Ok(flag) = std::env::var("ORION_GLOBAL_DRY_RUN") {
            self.global_dry_run = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_as_valid_config() {
        let config = SentinelConfig::default();
        assert_eq!(config.log_store_url, "http://localhost:3100");
        assert!(!config.global_dry_run);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SentinelConfig::load(Path::new("/nonexistent/sentinel.json"));
        assert_eq!(config.inventory_interval_secs, 600);
    }

    #[test]
    fn is_yaml_path_matches_yaml_and_yml() {
        assert!(is_yaml_path(Path::new("a.yaml")));
        assert!(is_yaml_path(Path::new("a.yml")));
        assert!(!is_yaml_path(Path::new("a.json")));
    }
}
