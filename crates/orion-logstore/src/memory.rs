//! In-memory `LogStoreClient` used by tests and, per spec §9's
//! "testable without model binaries" spirit, by any deployment that
//! wants to exercise the core without a live log store.

use crate::client::{LogRecord, LogStoreClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orion_common::OrionError;
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryLogStore {
    records: RwLock<Vec<LogRecord>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record currently stored, oldest first. Test
    /// helper only.
    pub fn all(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn matches_selector(labels: &[(String, String)], selector: &str) -> bool {
    // Selector grammar: `{k="v", k2="v2"}` (Loki-shaped) or empty/`{}` for
    // "match everything". Parsed loosely since the real query language
    // is owned by the external log store.
    let trimmed = selector.trim().trim_start_matches('{').trim_end_matches('}');
    if trimmed.is_empty() {
        return true;
    }
    trimmed.split(',').all(|clause| {
        let clause = clause.trim();
        if clause.is_empty() {
            return true;
        }
        let Some((key, value)) = clause.split_once('=') else {
            return true;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');
        labels
            .iter()
            .any(|(k, v)| k == key && v == value)
    })
}

#[async_trait]
impl LogStoreClient for InMemoryLogStore {
    async fn push(
        &self,
        stream_labels: &[(String, String)],
        lines: Vec<String>,
    ) -> Result<(), OrionError> {
        let mut records = self.records.write();
        for line in lines {
            records.push(LogRecord {
                timestamp: Utc::now(),
                labels: stream_labels.to_vec(),
                line,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogRecord>, OrionError> {
        let records = self.records.read();
        let mut matched: Vec<LogRecord> = records
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .filter(|r| matches_selector(&r.labels, selector))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn push_then_query_round_trips() {
        let store = InMemoryLogStore::new();
        store
            .push(
                &[("event_type".into(), "new_device".into())],
                vec!["{}".to_string()],
            )
            .await
            .unwrap();

        let now = Utc::now();
        let results = store
            .query(
                "{event_type=\"new_device\"}",
                now - Duration::minutes(1),
                now + Duration::minutes(1),
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn query_respects_limit_newest_first() {
        let store = InMemoryLogStore::new();
        for i in 0..5 {
            store.push(&[], vec![format!("line-{i}")]).await.unwrap();
        }
        let now = Utc::now();
        let results = store
            .query("{}", now - Duration::minutes(1), now + Duration::minutes(1), 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].line, "line-4");
    }

    #[tokio::test]
    async fn selector_filters_by_label() {
        let store = InMemoryLogStore::new();
        store
            .push(&[("severity".into(), "high".into())], vec!["a".into()])
            .await
            .unwrap();
        store
            .push(&[("severity".into(), "low".into())], vec!["b".into()])
            .await
            .unwrap();
        let now = Utc::now();
        let results = store
            .query(
                "{severity=\"high\"}",
                now - Duration::minutes(1),
                now + Duration::minutes(1),
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line, "a");
    }
}
