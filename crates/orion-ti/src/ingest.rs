//! Feed ingest loop (spec §4.G "Feed ingest"): download each enabled
//! feed, parse, normalize, upsert; per-feed failure is isolated.

use crate::feeds::{FeedParser, FeodoParser, OtxParser, PhishtankParser, UrlhausParser};
use crate::ioc::FeedSource;
use crate::store::IocStore;
use chrono::{Duration, Utc};
use orion_common::OrionResult;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Default feed-fetch deadline (spec §5).
pub const FEED_FETCH_DEADLINE: StdDuration = StdDuration::from_secs(120);

/// Default IOC retention horizon (spec §4.C/§4.G).
pub const DEFAULT_RETENTION: Duration = Duration::days(90);

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source: FeedSource,
    pub url: String,
    pub enabled: bool,
}

pub struct FeedIngestor {
    client: Client,
    ioc_store: Arc<IocStore>,
    feeds: Vec<FeedConfig>,
    retention: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub feeds_attempted: usize,
    pub feeds_failed: usize,
    pub iocs_ingested: usize,
}

impl FeedIngestor {
    pub fn new(client: Client, ioc_store: Arc<IocStore>, feeds: Vec<FeedConfig>) -> Self {
        Self {
            client,
            ioc_store,
            feeds,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn parser_for(source: FeedSource) -> Option<Box<dyn FeedParser>> {
        match source {
            FeedSource::Otx => Some(Box::new(OtxParser)),
            FeedSource::Urlhaus => Some(Box::new(UrlhausParser)),
            FeedSource::Feodo => Some(Box::new(FeodoParser)),
            FeedSource::Phishtank => Some(Box::new(PhishtankParser)),
            FeedSource::Manual => None,
        }
    }

    /// Fetch and ingest every enabled feed, then purge stale IOCs.
    /// Per-feed failures are logged and do not abort the cycle.
    pub async fn run_cycle(&self) -> OrionResult<IngestStats> {
        let mut stats = IngestStats::default();
        for feed in self.feeds.iter().filter(|f| f.enabled) {
            stats.feeds_attempted += 1;
            match self.ingest_one(feed).await {
                Ok(count) => stats.iocs_ingested += count,
                Err(e) => {
                    stats.feeds_failed += 1;
                    tracing::warn!(source = feed.source.as_str(), error = %e, "feed ingest failed, continuing");
                }
            }
        }
        self.ioc_store.purge_older_than(self.retention, Utc::now());
        Ok(stats)
    }

    async fn ingest_one(&self, feed: &FeedConfig) -> OrionResult<usize> {
        let Some(parser) = Self::parser_for(feed.source) else {
            return Ok(0);
        };
        let response = self
            .client
            .get(&feed.url)
            .timeout(FEED_FETCH_DEADLINE)
            .send()
            .await
            .map_err(|e| orion_common::OrionError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(orion_common::OrionError::Rejected(format!(
                "feed {} returned {}",
                feed.source.as_str(),
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| orion_common::OrionError::Unavailable(e.to_string()))?;
        let iocs = parser.parse(&body)?;
        let count = iocs.len();
        self.ioc_store.upsert_batch(iocs);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioc::IocType;

    #[tokio::test]
    async fn disabled_feeds_are_skipped() {
        let ioc_store = Arc::new(IocStore::new());
        let ingestor = FeedIngestor::new(
            Client::new(),
            ioc_store.clone(),
            vec![FeedConfig {
                source: FeedSource::Otx,
                url: "http://unused.invalid/pulses".to_string(),
                enabled: false,
            }],
        );
        let stats = ingestor.run_cycle().await.unwrap();
        assert_eq!(stats.feeds_attempted, 0);
        assert_eq!(ioc_store.lookup("anything", IocType::Domain).len(), 0);
    }

    #[tokio::test]
    async fn unreachable_feed_is_isolated_not_fatal() {
        let ioc_store = Arc::new(IocStore::new());
        let ingestor = FeedIngestor::new(
            Client::new(),
            ioc_store,
            vec![FeedConfig {
                source: FeedSource::Urlhaus,
                url: "http://127.0.0.1:1/nonexistent".to_string(),
                enabled: true,
            }],
        );
        let stats = ingestor.run_cycle().await.unwrap();
        assert_eq!(stats.feeds_attempted, 1);
        assert_eq!(stats.feeds_failed, 1);
    }
}
