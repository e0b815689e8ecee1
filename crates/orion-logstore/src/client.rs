//! The `LogStoreClient` trait (spec §4.A) and its HTTP implementation
//! against a Loki-shaped push/query API (spec §6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orion_common::OrionError;
use std::time::Duration;

/// A single log line carrying its label set.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub labels: Vec<(String, String)>,
    pub line: String,
}

/// Narrow capability trait: push/query/tail against the external
/// append-only log store. Implementations may treat `tail` as optional
/// and fall back to polling (spec §4.A).
#[async_trait]
pub trait LogStoreClient: Send + Sync {
    /// Atomically append one or more records under a labeled stream.
    async fn push(
        &self,
        stream_labels: &[(String, String)],
        lines: Vec<String>,
    ) -> Result<(), OrionError>;

    /// Range query, newest first. Partial results are allowed on error.
    async fn query(
        &self,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogRecord>, OrionError>;
}

/// Per-push batch-size cap (spec §4.A default 1 MB).
pub const DEFAULT_BATCH_CAP_BYTES: usize = 1024 * 1024;

/// Split `lines` into batches no larger than `cap_bytes`, preserving
/// order. A single oversized line still gets its own batch (never
/// dropped silently).
pub fn split_into_batches(lines: Vec<String>, cap_bytes: usize) -> Vec<Vec<String>> {
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_size = 0usize;

    for line in lines {
        let line_size = line.len();
        if !current.is_empty() && current_size + line_size > cap_bytes {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += line_size;
        current.push(line);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Deadlines from spec §5.
pub const QUERY_DEADLINE: Duration = Duration::from_secs(30);
pub const PUSH_DEADLINE: Duration = Duration::from_secs(10);

/// Exponential backoff schedule for push retries: 100ms -> 60s, capped,
/// with +/-20% jitter (spec §4.A, §5).
pub fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 100u64.saturating_mul(1u64 << attempt.min(10));
    let capped_ms = base_ms.min(60_000);
    let jitter_frac = rand::random::<f64>() * 0.4 - 0.2; // +/-20%
    let jittered = (capped_ms as f64) * (1.0 + jitter_frac);
    Duration::from_millis(jittered.max(1.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_respect_byte_cap() {
        let lines = vec!["a".repeat(10), "b".repeat(10), "c".repeat(10)];
        let batches = split_into_batches(lines, 15);
        assert_eq!(batches.len(), 3);
        for batch in &batches {
            let total: usize = batch.iter().map(|l| l.len()).sum();
            assert!(total <= 15 || batch.len() == 1);
        }
    }

    #[test]
    fn single_oversized_line_gets_own_batch() {
        let lines = vec!["x".repeat(100)];
        let batches = split_into_batches(lines, 10);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].len(), 100);
    }

    #[test]
    fn preserves_order_across_batches() {
        let lines: Vec<String> = (0..10).map(|i| format!("line-{i}")).collect();
        let batches = split_into_batches(lines.clone(), 20);
        let flattened: Vec<String> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, lines);
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        for attempt in 0..20 {
            let delay = backoff_delay(attempt);
            assert!(delay.as_millis() <= 72_000);
        }
    }
}
