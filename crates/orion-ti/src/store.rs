//! IOC Store (spec §4.C): durable keyed store with (type, value) as
//! the lookup key, sub-millisecond membership checks via `DashMap`.

use crate::ioc::{normalize_value, FeedSource, Ioc, IocType};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use orion_common::OrionError;
use parking_lot::RwLock;
use std::path::Path;

/// One recorded match, kept for audit (spec §4.C).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IocMatch {
    pub ioc_value: String,
    pub source: FeedSource,
    pub device_id: Option<String>,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct IocStats {
    pub total: usize,
    pub by_type: Vec<(IocType, usize)>,
    pub matches_24h: usize,
}

/// `(type, normalized value)` lookup key.
type IocKey = (IocType, String);

pub struct IocStore {
    /// Multiple sources may carry the same (type, value); each source
    /// is a distinct record sharing the lookup key.
    records: DashMap<IocKey, Vec<Ioc>>,
    matches: RwLock<Vec<IocMatch>>,
}

impl IocStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            matches: RwLock::new(Vec::new()),
        }
    }

    /// Idempotent on `(value, type, source)`; updates last-seen and
    /// confidence (max) on repeat ingest.
    pub fn upsert_batch(&self, iocs: Vec<Ioc>) {
        for mut ioc in iocs {
            ioc.value = normalize_value(&ioc.value, ioc.ioc_type);
            let key = (ioc.ioc_type, ioc.value.clone());
            let mut slot = self.records.entry(key).or_insert_with(Vec::new);
            if let Some(existing) = slot.iter_mut().find(|r| r.source == ioc.source) {
                existing.last_seen = existing.last_seen.max(ioc.last_seen);
                existing.first_seen = existing.first_seen.min(ioc.first_seen);
                existing.confidence = existing.confidence.max(ioc.confidence);
                existing.category = ioc.category;
                for tag in ioc.tags {
                    if !existing.tags.contains(&tag) {
                        existing.tags.push(tag);
                    }
                }
                if ioc.malware_family.is_some() {
                    existing.malware_family = ioc.malware_family;
                }
                if ioc.description.is_some() {
                    existing.description = ioc.description;
                }
            } else {
                slot.push(ioc);
            }
        }
    }

    /// All records matching `(type, value)` across sources, newest
    /// last-seen first.
    pub fn lookup(&self, value: &str, ioc_type: IocType) -> Vec<Ioc> {
        let normalized = normalize_value(value, ioc_type);
        let mut matches = self
            .records
            .get(&(ioc_type, normalized))
            .map(|slot| slot.clone())
            .unwrap_or_default();
        matches.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        matches
    }

    pub fn lookup_many(&self, values: &[String], ioc_type: IocType) -> Vec<(String, Vec<Ioc>)> {
        values
            .iter()
            .map(|v| (v.clone(), self.lookup(v, ioc_type)))
            .filter(|(_, hits)| !hits.is_empty())
            .collect()
    }

    /// Deletes records whose last-seen predates `now - horizon`.
    pub fn purge_older_than(&self, horizon: Duration, now: DateTime<Utc>) {
        let cutoff = now - horizon;
        self.records.retain(|_, slot| {
            slot.retain(|ioc| ioc.last_seen >= cutoff);
            !slot.is_empty()
        });
    }

    pub fn record_match(&self, ioc_value: &str, source: FeedSource, device_id: Option<String>, matched_at: DateTime<Utc>) {
        self.matches.write().push(IocMatch {
            ioc_value: ioc_value.to_string(),
            source,
            device_id,
            matched_at,
        });
    }

    pub fn stats(&self, now: DateTime<Utc>) -> IocStats {
        let mut by_type: std::collections::HashMap<IocType, usize> = std::collections::HashMap::new();
        let mut total = 0usize;
        for entry in self.records.iter() {
            total += entry.value().len();
            *by_type.entry(entry.key().0).or_insert(0) += entry.value().len();
        }
        let day_ago = now - Duration::hours(24);
        let matches_24h = self.matches.read().iter().filter(|m| m.matched_at >= day_ago).count();
        IocStats {
            total,
            by_type: by_type.into_iter().collect(),
            matches_24h,
        }
    }

    pub async fn persist(&self, path: &Path) -> Result<(), OrionError> {
        let snapshot: Vec<Ioc> = self.records.iter().flat_map(|e| e.value().clone()).collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, OrionError> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Vec<Ioc> = serde_json::from_slice(&bytes)?;
        store.upsert_batch(snapshot);
        Ok(store)
    }
}

impl Default for IocStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioc::ThreatCategory;

    fn sample_ioc(value: &str, confidence: f64, seen_at: DateTime<Utc>) -> Ioc {
        Ioc::new(value, IocType::Domain, FeedSource::Urlhaus, confidence, ThreatCategory::Malware, seen_at)
    }

    #[test]
    fn upsert_twice_merges_into_one_record_with_max_last_seen() {
        let store = IocStore::new();
        let t0 = Utc::now();
        store.upsert_batch(vec![sample_ioc("evil.example.com", 0.8, t0)]);
        store.upsert_batch(vec![sample_ioc("evil.example.com", 0.9, t0 + Duration::hours(1))]);

        let hits = store.lookup("evil.example.com", IocType::Domain);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].last_seen, t0 + Duration::hours(1));
        assert_eq!(hits[0].confidence, 0.9);
    }

    #[test]
    fn distinct_sources_for_same_value_coexist() {
        let store = IocStore::new();
        let t0 = Utc::now();
        store.upsert_batch(vec![sample_ioc("evil.example.com", 0.8, t0)]);
        let mut other = sample_ioc("evil.example.com", 0.95, t0);
        other.source = FeedSource::Otx;
        store.upsert_batch(vec![other]);

        let hits = store.lookup("evil.example.com", IocType::Domain);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn lookup_is_case_insensitive_via_normalization() {
        let store = IocStore::new();
        store.upsert_batch(vec![sample_ioc("Evil.Example.Com", 0.8, Utc::now())]);
        assert_eq!(store.lookup("evil.example.com", IocType::Domain).len(), 1);
    }

    #[test]
    fn purge_removes_stale_records_only() {
        let store = IocStore::new();
        let now = Utc::now();
        store.upsert_batch(vec![sample_ioc("stale.example.com", 0.8, now - Duration::days(100))]);
        store.upsert_batch(vec![sample_ioc("fresh.example.com", 0.8, now)]);

        store.purge_older_than(Duration::days(90), now);
        assert!(store.lookup("stale.example.com", IocType::Domain).is_empty());
        assert_eq!(store.lookup("fresh.example.com", IocType::Domain).len(), 1);
    }

    #[test]
    fn lookup_many_returns_only_hits() {
        let store = IocStore::new();
        store.upsert_batch(vec![sample_ioc("evil.example.com", 0.8, Utc::now())]);
        let hits = store.lookup_many(
            &["evil.example.com".to_string(), "benign.example.com".to_string()],
            IocType::Domain,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "evil.example.com");
    }
}
