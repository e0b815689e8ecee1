//! HTTP log-store client, speaking the push/query wire format of
//! spec §6: `POST {streams: [{stream, values: [[nanos, line]]}]}` and
//! `GET ?query=...&start=...&end=...&limit=...`.

use crate::client::{
    backoff_delay, split_into_batches, LogRecord, LogStoreClient, DEFAULT_BATCH_CAP_BYTES,
    PUSH_DEADLINE, QUERY_DEADLINE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orion_common::OrionError;
use serde::Deserialize;
use serde_json::json;

/// HTTP log-store client.
pub struct HttpLogStoreClient {
    base_url: String,
    client: reqwest::Client,
    batch_cap_bytes: usize,
    max_retries: u32,
}

impl HttpLogStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            batch_cap_bytes: DEFAULT_BATCH_CAP_BYTES,
            max_retries: 5,
        }
    }

    async fn push_batch(
        &self,
        stream_labels: &[(String, String)],
        lines: &[String],
    ) -> Result<(), OrionError> {
        let stream: std::collections::HashMap<&str, &str> = stream_labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let values: Vec<[String; 2]> = lines
            .iter()
            .map(|line| {
                let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
                [nanos.to_string(), line.clone()]
            })
            .collect();
        let body = json!({ "streams": [{ "stream": stream, "values": values }] });

        let mut attempt = 0u32;
        loop {
            let resp = self
                .client
                .post(format!("{}/loki/api/v1/push", self.base_url))
                .timeout(PUSH_DEADLINE)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(r) if r.status().is_success() => return Ok(()),
                Ok(r) if r.status().is_client_error() => {
                    return Err(OrionError::Rejected(format!(
                        "log store rejected push: {}",
                        r.status()
                    )));
                }
                Ok(r) => {
                    tracing::warn!(status = %r.status(), "log store push failed, retrying");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "log store push transport error, retrying");
                }
            }

            attempt += 1;
            if attempt > self.max_retries {
                return Err(OrionError::Unavailable(
                    "log store push exhausted retries".into(),
                ));
            }
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Deserialize)]
struct QueryData {
    result: Vec<QueryStream>,
}

#[derive(Deserialize)]
struct QueryStream {
    stream: std::collections::HashMap<String, String>,
    values: Vec<[String; 2]>,
}

#[async_trait]
impl LogStoreClient for HttpLogStoreClient {
    async fn push(
        &self,
        stream_labels: &[(String, String)],
        lines: Vec<String>,
    ) -> Result<(), OrionError> {
        for batch in split_into_batches(lines, self.batch_cap_bytes) {
            self.push_batch(stream_labels, &batch).await?;
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
        let resp = self
            .client
            .get(format!("{}/loki/api/v1/query_range", self.base_url))
            .timeout(QUERY_DEADLINE)
            .query(&[
                ("query", selector.to_string()),
                ("start", start.timestamp_nanos_opt().unwrap_or_default().to_string()),
                ("end", end.timestamp_nanos_opt().unwrap_or_default().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| OrionError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OrionError::Unavailable(format!(
                "log store query failed: {}",
                resp.status()
            )));
        }

        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| OrionError::Invalid(e.to_string()))?;

        let mut records = Vec::new();
        for stream in parsed.data.result {
            let labels: Vec<(String, String)> = stream.stream.into_iter().collect();
            for [nanos_str, line] in stream.values {
                let nanos: i64 = nanos_str.parse().unwrap_or_default();
                let timestamp = DateTime::from_timestamp(
                    nanos / 1_000_000_000,
                    (nanos % 1_000_000_000) as u32,
                )
                .unwrap_or_else(Utc::now);
                records.push(LogRecord {
                    timestamp,
                    labels: labels.clone(),
                    line,
                });
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }
}
